//! Command-line argument parsing for Radioport.

use std::path::PathBuf;

use clap::Parser;


/// Radioport - In-game radio stations in your terminal.
#[derive( Parser, Debug )]
#[command( name = "radioport" )]
#[command( version, about, long_about = None )]
pub struct Args {
    /// Station to tune to (full name, frequency or part of the name).
    #[arg( short, long )]
    pub station: Option<String>,

    /// Directory holding the extracted `audio/` tree.
    #[arg( short, long )]
    pub data_dir: Option<PathBuf>,

    /// Fixed random seed for a reproducible rotation.
    #[arg( long )]
    pub seed: Option<u64>,

    /// Open the session with a station jingle.
    #[arg( short = 'j', long )]
    pub start_with_jingle: bool,

    /// Print the station table and exit.
    #[arg( short, long )]
    pub list_stations: bool,
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_parse_flags() {
        let args = Args::parse_from([ "radioport", "--station", "night", "--seed", "7", "-j" ]);
        assert_eq!( args.station.as_deref(), Some( "night" ) );
        assert_eq!( args.seed, Some( 7 ) );
        assert!( args.start_with_jingle );
        assert!( !args.list_stations );
        assert!( args.data_dir.is_none() );
    }
}
