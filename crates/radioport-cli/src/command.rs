//! Slash command parsing.
//!
//! Commands typed after `/` in the TUI: tuning, playback control and live
//! changes to the rotation rules.

use std::str::FromStr;

use thiserror::Error;

use radioport_core::{ Category, RotationConfig };


/// Errors that can occur during command parsing.
#[derive( Debug, Error, PartialEq )]
pub enum CommandError {
    #[error( "Unknown command: {0}" )]
    Unknown( String ),

    #[error( "Invalid argument: {0}" )]
    InvalidArgument( String ),

    #[error( "Missing argument: {0}" )]
    MissingArgument( String ),
}


/// Parsed slash command.
#[derive( Debug, Clone, PartialEq )]
pub enum Command {
    // Tuning
    Station { query: String },
    Next,
    Prev,
    Stations,

    // Playback
    Skip,
    Pause,
    Stop,
    Volume { level: Option<u32> },
    Mute,

    // Rotation
    Spacing { category: Category, value: u32 },
    Weight { category: Category, value: f64 },
    Window { value: usize },
    Lookahead { value: usize },
    Seed { value: Option<u64> },
    Reset,

    // Desktop
    Notify,
    Media,

    // UI
    Help,
    Quit,
}


/// Splits "<category> <value>" arguments.
fn category_and<T: FromStr>( args: Option<&str>, what: &str ) -> Result<( Category, T ), CommandError> {
    let args = args.ok_or_else( || CommandError::MissingArgument( format!( "category and {}", what ) ) )?;
    let ( cat, value ) = args
        .split_once( ' ' )
        .ok_or_else( || CommandError::MissingArgument( what.to_string() ) )?;

    let category = cat.parse::<Category>().map_err( CommandError::InvalidArgument )?;
    let value = value.trim().parse::<T>()
        .map_err( |_| CommandError::InvalidArgument( format!( "Invalid {}: {}", what, value.trim() ) ) )?;
    Ok(( category, value ))
}


fn number<T: FromStr>( args: Option<&str>, what: &str ) -> Result<T, CommandError> {
    let arg = args.ok_or_else( || CommandError::MissingArgument( what.to_string() ) )?;
    arg.parse().map_err( |_| CommandError::InvalidArgument( format!( "Invalid {}: {}", what, arg ) ) )
}


impl Command {
    /// Parses a command string (without the leading `/`).
    pub fn parse( input: &str ) -> Result<Self, CommandError> {
        let input = input.trim();
        let mut parts = input.splitn( 2, ' ' );
        let cmd = parts.next().unwrap_or( "" ).to_lowercase();
        let args = parts.next().map( |s| s.trim() ).filter( |s| !s.is_empty() );

        match cmd.as_str() {
            "station" | "tune" | "t" => {
                let query = args.ok_or_else( || CommandError::MissingArgument( "station".into() ) )?;
                Ok( Command::Station { query: query.to_string() } )
            }
            "next" | "n" => Ok( Command::Next ),
            "prev" | "previous" | "p" => Ok( Command::Prev ),
            "stations" | "list" | "ls" => Ok( Command::Stations ),

            "skip" | "s" => Ok( Command::Skip ),
            "pause" | "pa" => Ok( Command::Pause ),
            "stop" => Ok( Command::Stop ),
            "vol" | "volume" => {
                let level = args.map( |s| number( Some( s ), "volume" ) ).transpose()?;
                Ok( Command::Volume { level } )
            }
            "mute" | "m" => Ok( Command::Mute ),

            "spacing" | "space" => {
                let ( category, value ) = category_and( args, "spacing" )?;
                Ok( Command::Spacing { category, value } )
            }
            "weight" | "w" => {
                let ( category, value ) = category_and::<f64>( args, "weight" )?;
                if !value.is_finite() || value < 0.0 {
                    return Err( CommandError::InvalidArgument( format!( "Invalid weight: {}", value ) ) );
                }
                Ok( Command::Weight { category, value } )
            }
            "window" => Ok( Command::Window { value: number( args, "window" )? } ),
            "lookahead" | "ahead" => Ok( Command::Lookahead { value: number( args, "lookahead" )? } ),
            "seed" => {
                let value = args.map( |s| number( Some( s ), "seed" ) ).transpose()?;
                Ok( Command::Seed { value } )
            }
            "reset" => Ok( Command::Reset ),

            "notify" | "notifications" => Ok( Command::Notify ),
            "media" => Ok( Command::Media ),

            "help" | "h" => Ok( Command::Help ),
            "quit" | "q" | "exit" => Ok( Command::Quit ),

            "" => Err( CommandError::Unknown( "empty command".into() ) ),
            other => Err( CommandError::Unknown( other.to_string() ) ),
        }
    }


    /// For rotation commands, the configuration they produce from `current`.
    pub fn rotation_change( &self, current: &RotationConfig ) -> Option<RotationConfig> {
        let mut config = current.clone();
        match self {
            Command::Spacing { category, value } => config.rule_mut( *category ).min_spacing = *value,
            Command::Weight { category, value } => config.rule_mut( *category ).weight = *value,
            Command::Window { value } => {
                config.no_repeat_window = *value;
                config.history_window = config.history_window.max( *value );
            }
            Command::Lookahead { value } => config.lookahead = *value,
            Command::Seed { value } => config.seed = *value,
            Command::Reset => {
                config = RotationConfig {
                    seed: current.seed,
                    ..RotationConfig::default()
                };
            }
            _ => return None,
        }
        Some( config )
    }
}


/// Returns help text listing all available commands.
pub fn help_text() -> &'static str {
    r#"Tuning:
  /station <name>          Tune to a station (name, frequency or part)
  /next  /prev             Step along the dial                           [→/←]
  /stations                Pick from the station list                    [l]

Playback:
  /skip                    Skip the current segment                      [s]
  /pause                   Pause or resume                               [Space]
  /stop                    Stop the broadcast                            [x]
  /vol [0-150]             Set volume                                    [+/-]
  /mute                    Toggle mute                                   [m]

Rotation:
  /spacing <cat> <n>       Segments between two of a category
  /weight <cat> <w>        Selection weight of a category
  /window <n>              Picks before a segment may repeat
  /lookahead <n>           Segments kept queued
  /seed [n]                Fix the random seed (none: time-based)
  /reset                   Restore default rotation
  Categories: song, dj-line, jingle, advert

Desktop:
  /notify                  Toggle song notifications
  /media                   Toggle OS media controls

Other:
  /help                    Show this help                                [?]
  /quit                    Exit radioport                                [q]"#
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_parse_station() {
        let cmd = Command::parse( "station night fm" ).unwrap();
        assert_eq!( cmd, Command::Station { query: "night fm".into() } );
        assert_eq!( Command::parse( "t 98.7" ).unwrap(), Command::Station { query: "98.7".into() } );
    }


    #[test]
    fn test_parse_missing_station() {
        let result = Command::parse( "station   " );
        assert!( matches!( result, Err( CommandError::MissingArgument( _ ) ) ) );
    }


    #[test]
    fn test_parse_volume() {
        assert_eq!( Command::parse( "vol 80" ).unwrap(), Command::Volume { level: Some( 80 ) } );
        assert_eq!( Command::parse( "vol" ).unwrap(), Command::Volume { level: None } );
        assert!( matches!( Command::parse( "vol loud" ), Err( CommandError::InvalidArgument( _ ) ) ) );
    }


    #[test]
    fn test_parse_spacing() {
        let cmd = Command::parse( "spacing jingle 5" ).unwrap();
        assert_eq!( cmd, Command::Spacing { category: Category::Jingle, value: 5 } );

        let cmd = Command::parse( "spacing ad 2" ).unwrap();
        assert_eq!( cmd, Command::Spacing { category: Category::Advert, value: 2 } );
    }


    #[test]
    fn test_parse_weight_rejects_negative() {
        assert_eq!( Command::parse( "weight dj 0.3" ).unwrap(), Command::Weight { category: Category::DjLine, value: 0.3 } );
        assert!( matches!( Command::parse( "weight song -1" ), Err( CommandError::InvalidArgument( _ ) ) ) );
        assert!( matches!( Command::parse( "weight news 1" ), Err( CommandError::InvalidArgument( _ ) ) ) );
        assert!( matches!( Command::parse( "weight song" ), Err( CommandError::MissingArgument( _ ) ) ) );
    }


    #[test]
    fn test_parse_seed() {
        assert_eq!( Command::parse( "seed 2077" ).unwrap(), Command::Seed { value: Some( 2077 ) } );
        assert_eq!( Command::parse( "seed" ).unwrap(), Command::Seed { value: None } );
    }


    #[test]
    fn test_parse_desktop_toggles() {
        assert_eq!( Command::parse( "notify" ).unwrap(), Command::Notify );
        assert_eq!( Command::parse( "Media" ).unwrap(), Command::Media );
        assert!( Command::Notify.rotation_change( &RotationConfig::default() ).is_none() );
        assert!( help_text().contains( "/notify" ) );
    }


    #[test]
    fn test_parse_unknown() {
        assert!( matches!( Command::parse( "foobar" ), Err( CommandError::Unknown( _ ) ) ) );
        assert!( matches!( Command::parse( "" ), Err( CommandError::Unknown( _ ) ) ) );
    }


    #[test]
    fn test_rotation_change() {
        let current = RotationConfig::default();

        let spaced = Command::Spacing { category: Category::Jingle, value: 6 }.rotation_change( &current ).unwrap();
        assert_eq!( spaced.jingle.min_spacing, 6 );

        let wide = Command::Window { value: 40 }.rotation_change( &current ).unwrap();
        assert_eq!( wide.no_repeat_window, 40 );
        assert!( wide.validate().is_ok() );

        assert!( Command::Skip.rotation_change( &current ).is_none() );
    }


    #[test]
    fn test_reset_keeps_seed() {
        let current = RotationConfig { seed: Some( 9 ), lookahead: 6, ..Default::default() };
        let reset = Command::Reset.rotation_change( &current ).unwrap();
        assert_eq!( reset.lookahead, 2 );
        assert_eq!( reset.seed, Some( 9 ) );
    }
}
