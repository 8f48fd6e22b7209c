//! Input handling for the TUI.
//!
//! Tracks the input mode (Normal, Command, Filter), the text buffer used
//! while typing, and the mapping from normal-mode keys to radio actions.

use crossterm::event::KeyCode;


/// Current input mode of the application.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Default )]
pub enum InputMode {
    /// Keyboard shortcuts active.
    #[default]
    Normal,

    /// Typing a slash command.
    Command,

    /// Typing a station list filter.
    Filter,
}


/// Actions bound to keys in normal mode.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum Action {
    TogglePause,
    Skip,
    Stop,
    NextStation,
    PrevStation,
    VolumeUp,
    VolumeDown,
    Mute,
    CommandMode,
    StationList,
    NextView,
    PrevView,
    Help,
    Back,
    Quit,
}


/// Maps a normal-mode key to its action.
pub fn map_key( code: KeyCode ) -> Option<Action> {
    let action = match code {
        KeyCode::Char( ' ' ) => Action::TogglePause,
        KeyCode::Char( 's' ) => Action::Skip,
        KeyCode::Char( 'x' ) => Action::Stop,
        KeyCode::Right | KeyCode::Char( ']' ) => Action::NextStation,
        KeyCode::Left | KeyCode::Char( '[' ) => Action::PrevStation,
        KeyCode::Char( '+' ) | KeyCode::Char( '=' ) => Action::VolumeUp,
        KeyCode::Char( '-' ) => Action::VolumeDown,
        KeyCode::Char( 'm' ) => Action::Mute,
        KeyCode::Char( '/' ) => Action::CommandMode,
        KeyCode::Char( 'l' ) => Action::StationList,
        KeyCode::Tab => Action::NextView,
        KeyCode::BackTab => Action::PrevView,
        KeyCode::Char( '?' ) => Action::Help,
        KeyCode::Esc => Action::Back,
        KeyCode::Char( 'q' ) => Action::Quit,
        _ => return None,
    };
    Some( action )
}


/// Input buffer for command and filter text entry.
#[derive( Debug, Default )]
pub struct InputBuffer {
    content: String,
    cursor: usize,
}


impl InputBuffer {
    pub fn new() -> Self {
        Self::default()
    }


    /// Inserts a character at the cursor position.
    pub fn insert( &mut self, c: char ) {
        self.content.insert( self.cursor, c );
        self.cursor += c.len_utf8();
    }


    /// Deletes the character before the cursor.
    pub fn backspace( &mut self ) {
        if let Some( ( prev, _ ) ) = self.content[ ..self.cursor ].char_indices().last() {
            self.content.remove( prev );
            self.cursor = prev;
        }
    }


    /// Deletes the character at the cursor position.
    pub fn delete( &mut self ) {
        if self.cursor < self.content.len() {
            self.content.remove( self.cursor );
        }
    }


    pub fn clear( &mut self ) {
        self.content.clear();
        self.cursor = 0;
    }


    pub fn content( &self ) -> &str {
        &self.content
    }


    /// Cursor position in characters, for display.
    pub fn cursor_char_pos( &self ) -> usize {
        self.content[ ..self.cursor ].chars().count()
    }


    pub fn move_left( &mut self ) {
        if let Some( ( prev, _ ) ) = self.content[ ..self.cursor ].char_indices().last() {
            self.cursor = prev;
        }
    }


    pub fn move_right( &mut self ) {
        if let Some( c ) = self.content[ self.cursor.. ].chars().next() {
            self.cursor += c.len_utf8();
        }
    }


    pub fn move_home( &mut self ) {
        self.cursor = 0;
    }


    pub fn move_end( &mut self ) {
        self.cursor = self.content.len();
    }


    pub fn is_empty( &self ) -> bool {
        self.content.is_empty()
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_map_key() {
        assert_eq!( map_key( KeyCode::Char( ' ' ) ), Some( Action::TogglePause ) );
        assert_eq!( map_key( KeyCode::Right ), Some( Action::NextStation ) );
        assert_eq!( map_key( KeyCode::Char( '[' ) ), Some( Action::PrevStation ) );
        assert_eq!( map_key( KeyCode::Char( '=' ) ), Some( Action::VolumeUp ) );
        assert_eq!( map_key( KeyCode::Char( 'q' ) ), Some( Action::Quit ) );
        assert_eq!( map_key( KeyCode::Char( 'z' ) ), None );
    }


    #[test]
    fn test_buffer_editing_multibyte() {
        let mut buffer = InputBuffer::new();
        for c in "vol 8é".chars() {
            buffer.insert( c );
        }
        assert_eq!( buffer.cursor_char_pos(), 6 );

        buffer.backspace();
        assert_eq!( buffer.content(), "vol 8" );

        buffer.move_left();
        buffer.insert( '9' );
        assert_eq!( buffer.content(), "vol 98" );

        buffer.move_home();
        buffer.delete();
        assert_eq!( buffer.content(), "ol 98" );

        buffer.move_end();
        buffer.move_right();
        assert_eq!( buffer.cursor_char_pos(), 5 );
    }


    #[test]
    fn test_backspace_on_empty() {
        let mut buffer = InputBuffer::new();
        buffer.backspace();
        buffer.move_left();
        assert!( buffer.is_empty() );
        assert_eq!( buffer.cursor_char_pos(), 0 );
    }
}
