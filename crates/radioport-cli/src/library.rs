//! Library scanning
//!
//! Builds the segment catalog from an extracted data directory:
//!
//! ```text
//! <data>/audio/stations/<station>/*.mp3   songs, jingle_*.mp3 are jingles
//! <data>/audio/dj/<station>/*.mp3         DJ lines, <name>.txt holds the subtitle
//! <data>/audio/adverts/*.mp3              adverts shared by every ad-carrying station
//! ```

use std::fs;
use std::path::{ Path, PathBuf };

use thiserror::Error;

use radioport_core::{ Catalog, CatalogBuilder, CatalogError, Category, Segment };

use crate::audio::{ Decoder, DecoderError, FileInfo };
use crate::stations::STATIONS;


/// Supported audio file extensions.
const SUPPORTED_EXTENSIONS: &[&str] = &[
    "mp3", "flac", "ogg", "wav", "m4a", "aac", "opus",
];


/// Errors that can occur during library operations.
#[derive( Debug, Error )]
pub enum LibraryError {
    #[error( "IO error: {0}" )]
    Io( #[from] std::io::Error ),

    #[error( "Path not found: {0}" )]
    NotFound( PathBuf ),

    #[error( transparent )]
    Catalog( #[from] CatalogError ),
}


/// Reads duration and tags from an audio file.
pub type Inspector = fn( &Path ) -> Result<FileInfo, DecoderError>;


/// Counts from the last scan.
#[derive( Debug, Clone, Copy, Default, PartialEq, Eq )]
pub struct ScanSummary {
    pub segments: usize,
    pub skipped: usize,
}


/// Scanner for an extracted data directory.
pub struct LibraryScanner {
    data_dir: PathBuf,
    inspector: Inspector,
}


impl LibraryScanner {
    /// Creates a scanner that inspects files with Symphonia.
    pub fn new( data_dir: impl Into<PathBuf> ) -> Self {
        Self {
            data_dir: data_dir.into(),
            inspector: Decoder::inspect,
        }
    }


    /// Replaces the file inspector.
    pub fn with_inspector( mut self, inspector: Inspector ) -> Self {
        self.inspector = inspector;
        self
    }


    fn audio_dir( &self ) -> PathBuf {
        self.data_dir.join( "audio" )
    }


    /// Scans the data directory into a catalog covering every known station.
    pub fn scan( &self ) -> Result<( Catalog, ScanSummary ), LibraryError> {
        let audio = self.audio_dir();
        if !audio.is_dir() {
            return Err( LibraryError::NotFound( audio ) );
        }

        tracing::info!( "Scanning: {:?}", audio );

        let mut builder = Catalog::builder();
        let mut summary = ScanSummary::default();

        for station in STATIONS {
            builder.add_station( station.profile() );

            for path in audio_files( &audio.join( "stations" ).join( station.name ) )? {
                let Some( stem ) = file_stem( &path ) else { continue };
                let category = if stem.starts_with( "jingle_" ) { Category::Jingle } else { Category::Song };
                let id = format!( "{}/{}", station.name, stem );
                self.add( &mut builder, &mut summary, &path, id, category, station.name )?;
            }

            if station.dj.is_some() {
                for path in audio_files( &audio.join( "dj" ).join( station.name ) )? {
                    let Some( stem ) = file_stem( &path ) else { continue };
                    let id = format!( "{}/dj/{}", station.name, stem );
                    self.add( &mut builder, &mut summary, &path, id, Category::DjLine, station.name )?;
                }
            }
        }

        for path in audio_files( &audio.join( "adverts" ) )? {
            let Some( stem ) = file_stem( &path ) else { continue };
            match self.segment( &path, format!( "advert/{}", stem ), Category::Advert, "" ) {
                Some( segment ) => {
                    builder.add_shared_advert( segment )?;
                    summary.segments += 1;
                }
                None => summary.skipped += 1,
            }
        }

        tracing::info!( "Found {} segments ({} skipped)", summary.segments, summary.skipped );
        Ok(( builder.build(), summary ))
    }


    fn add(
        &self,
        builder: &mut CatalogBuilder,
        summary: &mut ScanSummary,
        path: &Path,
        id: String,
        category: Category,
        station: &str,
    ) -> Result<(), LibraryError> {
        match self.segment( path, id, category, station ) {
            Some( segment ) => {
                builder.add_segment( segment )?;
                summary.segments += 1;
            }
            None => summary.skipped += 1,
        }
        Ok(())
    }


    /// Reads a file into a segment. Unreadable or silent files are skipped.
    fn segment( &self, path: &Path, id: String, category: Category, station: &str ) -> Option<Segment> {
        let info = match ( self.inspector )( path ) {
            Ok( info ) => info,
            Err( e ) => {
                tracing::warn!( "Skipping {:?}: {}", path, e );
                return None;
            }
        };

        let duration = match info.duration {
            Some( d ) if !d.is_zero() => d,
            _ => {
                tracing::warn!( "Skipping {:?}: unknown duration", path );
                return None;
            }
        };

        let stem = file_stem( path )?;
        let title = info.title.unwrap_or_else( || display_title( stem, category ) );
        let mut segment = Segment::new( id, category, duration, station, title ).with_path( path );

        if let Some( artist ) = info.artist {
            segment = segment.with_artist( artist );
        }

        let lower = stem.to_lowercase();
        for tag in [ "intro", "outro" ] {
            if lower.contains( &format!( "_{}", tag ) ) {
                segment = segment.with_tag( tag );
            }
        }

        if category == Category::DjLine {
            if let Some( text ) = read_subtitle( path ) {
                segment = segment.with_subtitle( text );
            }
        }

        Some( segment )
    }
}


/// Audio files directly inside `dir`, sorted. A missing directory is empty.
fn audio_files( dir: &Path ) -> Result<Vec<PathBuf>, LibraryError> {
    let entries = match fs::read_dir( dir ) {
        Ok( e ) => e,
        Err( e ) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!( "No directory {:?}", dir );
            return Ok( Vec::new() );
        }
        Err( e ) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            tracing::warn!( "Access denied: {:?}", dir );
            return Ok( Vec::new() );
        }
        Err( e ) => return Err( LibraryError::Io( e ) ),
    };

    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map( |entry| entry.path() )
        .filter( |path| path.is_file() && is_audio_file( path ) )
        .collect();
    files.sort();
    Ok( files )
}


/// Checks if a file has a supported audio extension.
fn is_audio_file( path: &Path ) -> bool {
    path.extension()
        .and_then( |e| e.to_str() )
        .map( |e| SUPPORTED_EXTENSIONS.contains( &e.to_lowercase().as_str() ) )
        .unwrap_or( false )
}


fn file_stem( path: &Path ) -> Option<&str> {
    path.file_stem().and_then( |s| s.to_str() )
}


/// Title for files without a title tag.
fn display_title( stem: &str, category: Category ) -> String {
    match category {
        Category::Jingle => "Station Jingle".to_string(),
        Category::DjLine => "DJ".to_string(),
        _ => stem.replace( '_', " " ),
    }
}


/// Text from `<name>.txt` beside a DJ line.
fn read_subtitle( audio: &Path ) -> Option<String> {
    let text = fs::read_to_string( audio.with_extension( "txt" ) ).ok()?;
    let text = text.trim();
    ( !text.is_empty() ).then( || text.to_string() )
}


#[cfg( test )]
mod tests {
    use std::time::Duration;

    use super::*;


    fn fake_inspect( path: &Path ) -> Result<FileInfo, DecoderError> {
        let name = path.file_name().and_then( |n| n.to_str() ).unwrap_or( "" );
        if name.contains( "broken" ) {
            return Err( DecoderError::UnsupportedFormat );
        }
        let title = name.contains( "tagged" ).then( || "Never Fade Away".to_string() );
        let artist = title.as_ref().map( |_| "SAMURAI".to_string() );
        Ok( FileInfo { duration: Some( Duration::from_secs( 42 ) ), title, artist } )
    }


    fn touch( path: PathBuf ) {
        fs::create_dir_all( path.parent().unwrap() ).unwrap();
        fs::write( path, b"" ).unwrap();
    }


    fn data_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join( "audio" );

        let night = audio.join( "stations" ).join( "92.9 Night FM" );
        touch( night.join( "song_a.mp3" ) );
        touch( night.join( "song_tagged.mp3" ) );
        touch( night.join( "jingle_7.mp3" ) );
        touch( night.join( "cover.png" ) );
        touch( night.join( "song_broken.mp3" ) );

        let growl_dj = audio.join( "dj" ).join( "89.7 Growl FM" );
        touch( growl_dj.join( "101_2.mp3" ) );
        fs::write( growl_dj.join( "101_2.txt" ), "Ash here, stay hungry.\n" ).unwrap();
        touch( growl_dj.join( "102_1_outro.mp3" ) );

        touch( audio.join( "adverts" ).join( "ab_ad_nicola.mp3" ) );
        dir
    }


    #[test]
    fn test_scan_classifies_files() {
        let dir = data_dir();
        let ( catalog, summary ) = LibraryScanner::new( dir.path() ).with_inspector( fake_inspect ).scan().unwrap();

        assert_eq!( summary.skipped, 1 );
        assert_eq!( catalog.segments_for( "92.9 Night FM", Category::Song ).len(), 2 );
        assert_eq!( catalog.segments_for( "92.9 Night FM", Category::Jingle ).len(), 1 );
        assert_eq!( catalog.segments_for( "92.9 Night FM", Category::Advert ).len(), 1 );
        assert!( catalog.validate( "92.9 Night FM" ).is_ok() );
    }


    #[test]
    fn test_scan_reads_tags_and_subtitles() {
        let dir = data_dir();
        let ( catalog, _ ) = LibraryScanner::new( dir.path() ).with_inspector( fake_inspect ).scan().unwrap();

        let songs = catalog.segments_for( "92.9 Night FM", Category::Song );
        let tagged = songs.iter().find( |s| s.id.as_str().ends_with( "song_tagged" ) ).unwrap();
        assert_eq!( tagged.display_name(), "SAMURAI – Never Fade Away" );
        let plain = songs.iter().find( |s| s.id.as_str().ends_with( "song_a" ) ).unwrap();
        assert_eq!( plain.title, "song a" );

        let lines = catalog.segments_for( "89.7 Growl FM", Category::DjLine );
        assert_eq!( lines.len(), 2 );
        assert_eq!( lines[ 0 ].subtitle.as_deref(), Some( "Ash here, stay hungry." ) );
        assert!( lines[ 1 ].has_tag( "outro" ) );
    }


    #[test]
    fn test_ad_free_stations_get_no_adverts() {
        let dir = data_dir();
        let ( catalog, _ ) = LibraryScanner::new( dir.path() ).with_inspector( fake_inspect ).scan().unwrap();
        assert!( catalog.segments_for( "89.7 Growl FM", Category::Advert ).is_empty() );
        assert_eq!( catalog.stations().count(), STATIONS.len() );
    }


    #[test]
    fn test_missing_audio_dir() {
        let dir = tempfile::tempdir().unwrap();
        let result = LibraryScanner::new( dir.path() ).with_inspector( fake_inspect ).scan();
        assert!( matches!( result, Err( LibraryError::NotFound( _ ) ) ) );
    }
}
