//! View mode management for the TUI.


/// Current view of the application.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Default )]
pub enum ViewMode {
    /// Current segment, queue and session counters.
    #[default]
    NowPlaying,

    /// The dial, with filter and selection.
    Stations,

    /// Rotation rules in effect.
    Rotation,

    /// Help overlay.
    Help,
}


impl ViewMode {
    /// Returns the next view in tab order. Help stays until dismissed.
    pub fn next_tab( self ) -> Self {
        match self {
            ViewMode::NowPlaying => ViewMode::Stations,
            ViewMode::Stations => ViewMode::Rotation,
            ViewMode::Rotation => ViewMode::NowPlaying,
            ViewMode::Help => ViewMode::Help,
        }
    }


    /// Returns the previous view in tab order.
    pub fn prev_tab( self ) -> Self {
        match self {
            ViewMode::NowPlaying => ViewMode::Rotation,
            ViewMode::Stations => ViewMode::NowPlaying,
            ViewMode::Rotation => ViewMode::Stations,
            ViewMode::Help => ViewMode::Help,
        }
    }


    pub fn title( self ) -> &'static str {
        match self {
            ViewMode::NowPlaying => "ON AIR",
            ViewMode::Stations => "STATIONS",
            ViewMode::Rotation => "ROTATION",
            ViewMode::Help => "HELP",
        }
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_tab_cycle() {
        let mut view = ViewMode::default();
        for _ in 0..3 {
            view = view.next_tab();
        }
        assert_eq!( view, ViewMode::NowPlaying );
        assert_eq!( ViewMode::NowPlaying.prev_tab(), ViewMode::Rotation );
        assert_eq!( ViewMode::Stations.prev_tab().next_tab(), ViewMode::Stations );
    }


    #[test]
    fn test_help_is_sticky() {
        assert_eq!( ViewMode::Help.next_tab(), ViewMode::Help );
        assert_eq!( ViewMode::Help.prev_tab(), ViewMode::Help );
    }
}
