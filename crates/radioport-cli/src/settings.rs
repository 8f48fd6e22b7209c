//! Application settings management
//!
//! Persistent settings: where the audio lives, the last station, volume and
//! the rotation rules. Command-line flags override what is stored.

use std::fs;
use std::path::{ Path, PathBuf };

use serde::{ Deserialize, Serialize };

use radioport_core::RotationConfig;

use crate::cli::Args;


/// Application settings.
#[derive( Debug, Clone, PartialEq, Serialize, Deserialize )]
#[serde( default )]
pub struct Settings {
    /// Directory holding the extracted `audio/` tree
    #[serde( skip_serializing_if = "Option::is_none" )]
    pub data_dir: Option<PathBuf>,

    /// Station tuned to on startup
    #[serde( skip_serializing_if = "Option::is_none" )]
    pub station: Option<String>,

    /// Volume level (0.0 to 1.5)
    pub volume: f32,

    /// Rotation rules
    pub rotation: RotationConfig,

    /// Publish now playing to the OS media overlay and accept its buttons
    pub media_controls_enabled: bool,

    /// Desktop notification when a song goes on air
    pub notifications_enabled: bool,
}


impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: None,
            station: None,
            volume: 1.0,
            rotation: RotationConfig::default(),
            media_controls_enabled: true,
            notifications_enabled: true,
        }
    }
}


impl Settings {
    /// Returns the path to the settings file.
    fn settings_path() -> Option<PathBuf> {
        dirs::config_dir().map( |p| p.join( "radioport" ).join( "settings.json" ) )
    }


    /// Loads settings from disk, or returns defaults if not found.
    pub fn load() -> Self {
        match Self::settings_path() {
            Some( path ) => Self::load_from( &path ),
            None => Self::default(),
        }
    }


    /// Loads settings from a specific file.
    pub fn load_from( path: &Path ) -> Self {
        if !path.exists() {
            return Self::default();
        }

        let contents = match fs::read_to_string( path ) {
            Ok( contents ) => contents,
            Err( e ) => {
                tracing::warn!( "Failed to read settings: {}", e );
                return Self::default();
            }
        };

        let settings: Self = match serde_json::from_str( &contents ) {
            Ok( settings ) => settings,
            Err( e ) => {
                tracing::warn!( "Ignoring malformed settings file {:?}: {}", path, e );
                return Self::default();
            }
        };

        if let Err( e ) = settings.rotation.validate() {
            tracing::warn!( "Invalid rotation settings ({}), using defaults", e );
            return Self { rotation: RotationConfig::default(), ..settings };
        }

        settings
    }


    /// Saves settings to disk.
    pub fn save( &self ) {
        if let Some( path ) = Self::settings_path() {
            self.save_to( &path );
        }
    }


    /// Saves settings to a specific file.
    pub fn save_to( &self, path: &Path ) {
        // Create parent directory if needed
        if let Some( parent ) = path.parent() {
            if !parent.exists() {
                if let Err( e ) = fs::create_dir_all( parent ) {
                    tracing::warn!( "Failed to create settings directory: {}", e );
                    return;
                }
            }
        }

        match serde_json::to_string_pretty( self ) {
            Ok( json ) => {
                if let Err( e ) = fs::write( path, json ) {
                    tracing::warn!( "Failed to save settings: {}", e );
                }
            }
            Err( e ) => {
                tracing::warn!( "Failed to serialize settings: {}", e );
            }
        }
    }


    /// Applies command-line overrides.
    pub fn merge_args( &mut self, args: &Args ) {
        if let Some( dir ) = &args.data_dir {
            self.data_dir = Some( dir.clone() );
        }
        if let Some( station ) = &args.station {
            self.station = Some( station.clone() );
        }
        if args.seed.is_some() {
            self.rotation.seed = args.seed;
        }
        if args.start_with_jingle {
            self.rotation.start_with_jingle = true;
        }
    }


    /// Data directory to scan: the configured one, or the current directory.
    pub fn data_dir_or_default( &self ) -> PathBuf {
        self.data_dir.clone().unwrap_or_else( || PathBuf::from( "." ) )
    }
}


#[cfg( test )]
mod tests {
    use clap::Parser;

    use super::*;


    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from( &dir.path().join( "settings.json" ) );
        assert_eq!( settings, Settings::default() );
    }


    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join( "nested" ).join( "settings.json" );

        let mut settings = Settings::default();
        settings.station = Some( "89.7 Growl FM".into() );
        settings.volume = 0.6;
        settings.rotation.jingle.min_spacing = 5;
        settings.save_to( &path );

        assert_eq!( Settings::load_from( &path ), settings );
    }


    #[test]
    fn test_malformed_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join( "settings.json" );
        fs::write( &path, "{ not json" ).unwrap();
        assert_eq!( Settings::load_from( &path ), Settings::default() );
    }


    #[test]
    fn test_desktop_toggles_default_on() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join( "settings.json" );
        fs::write( &path, r#"{ "volume": 0.8 }"# ).unwrap();

        let settings = Settings::load_from( &path );
        assert!( settings.media_controls_enabled );
        assert!( settings.notifications_enabled );

        let quiet = Settings { notifications_enabled: false, media_controls_enabled: false, ..settings };
        quiet.save_to( &path );
        let reloaded = Settings::load_from( &path );
        assert!( !reloaded.notifications_enabled );
        assert!( !reloaded.media_controls_enabled );
    }


    #[test]
    fn test_invalid_rotation_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join( "settings.json" );
        fs::write( &path, r#"{ "volume": 0.5, "rotation": { "lookahead": 0 } }"# ).unwrap();

        let settings = Settings::load_from( &path );
        assert_eq!( settings.volume, 0.5 );
        assert_eq!( settings.rotation, RotationConfig::default() );
    }


    #[test]
    fn test_args_override() {
        let mut settings = Settings { station: Some( "Impulse".into() ), ..Default::default() };
        let args = Args::parse_from([ "radioport", "--station", "dark star", "--seed", "42", "--start-with-jingle" ]);
        settings.merge_args( &args );

        assert_eq!( settings.station.as_deref(), Some( "dark star" ) );
        assert_eq!( settings.rotation.seed, Some( 42 ) );
        assert!( settings.rotation.start_with_jingle );
        assert_eq!( settings.data_dir_or_default(), PathBuf::from( "." ) );
    }
}
