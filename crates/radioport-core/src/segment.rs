//! Segments and their categories
//!
//! A segment is one playable unit of a station's broadcast: a song, a jingle,
//! a DJ line or an advert.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{ Deserialize, Serialize };


/// Kind of broadcast content.
///
/// Variants are declared in priority order; `Ord` follows it, so the
/// highest-priority category sorts first.
#[derive( Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize )]
#[serde( rename_all = "kebab-case" )]
pub enum Category {
    Song,
    DjLine,
    Jingle,
    Advert,
}


impl Category {
    /// All categories, highest priority first.
    pub const ALL: [Category; 4] = [ Category::Song, Category::DjLine, Category::Jingle, Category::Advert ];


    /// Position in the priority order (0 is highest).
    pub fn priority( self ) -> usize {
        self as usize
    }


    /// Short label used by displays.
    pub fn label( self ) -> &'static str {
        match self {
            Category::Song => "Song",
            Category::DjLine => "DJ",
            Category::Jingle => "Jingle",
            Category::Advert => "Advert",
        }
    }
}


impl fmt::Display for Category {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        match self {
            Category::Song => write!( f, "song" ),
            Category::DjLine => write!( f, "dj-line" ),
            Category::Jingle => write!( f, "jingle" ),
            Category::Advert => write!( f, "advert" ),
        }
    }
}


impl FromStr for Category {
    type Err = String;


    fn from_str( s: &str ) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace( '_', "-" ).as_str() {
            "song" | "tune" => Ok( Category::Song ),
            "dj-line" | "dj" | "link" => Ok( Category::DjLine ),
            "jingle" => Ok( Category::Jingle ),
            "advert" | "ad" => Ok( Category::Advert ),
            other => Err( format!( "Unknown category '{}'. Expected: song, dj-line, jingle, advert", other ) ),
        }
    }
}


/// Stable identifier of a segment within a catalog.
#[derive( Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize )]
pub struct SegmentId( pub String );


impl SegmentId {
    pub fn new( id: impl Into<String> ) -> Self {
        Self( id.into() )
    }


    pub fn as_str( &self ) -> &str {
        &self.0
    }
}


impl fmt::Display for SegmentId {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        f.write_str( &self.0 )
    }
}


impl From<&str> for SegmentId {
    fn from( s: &str ) -> Self {
        Self( s.to_string() )
    }
}


/// One playable audio unit. Immutable once loaded into a catalog.
#[derive( Debug, Clone, PartialEq, Serialize, Deserialize )]
pub struct Segment {
    pub id: SegmentId,
    pub category: Category,
    pub duration: Duration,
    /// Station the segment belongs to. Shared adverts carry the station they
    /// were registered for.
    pub station: String,
    pub title: String,
    #[serde( default, skip_serializing_if = "Option::is_none" )]
    pub artist: Option<String>,
    /// Spoken text of a DJ line, when known.
    #[serde( default, skip_serializing_if = "Option::is_none" )]
    pub subtitle: Option<String>,
    /// Audio file handed to the external player.
    #[serde( default, skip_serializing_if = "Option::is_none" )]
    pub path: Option<PathBuf>,
    #[serde( default, skip_serializing_if = "BTreeSet::is_empty" )]
    pub tags: BTreeSet<String>,
}


impl Segment {
    /// Creates a segment with no display metadata beyond its title.
    pub fn new(
        id: impl Into<SegmentId>,
        category: Category,
        duration: Duration,
        station: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            category,
            duration,
            station: station.into(),
            title: title.into(),
            artist: None,
            subtitle: None,
            path: None,
            tags: BTreeSet::new(),
        }
    }


    pub fn with_artist( mut self, artist: impl Into<String> ) -> Self {
        self.artist = Some( artist.into() );
        self
    }


    pub fn with_subtitle( mut self, subtitle: impl Into<String> ) -> Self {
        self.subtitle = Some( subtitle.into() );
        self
    }


    pub fn with_path( mut self, path: impl Into<PathBuf> ) -> Self {
        self.path = Some( path.into() );
        self
    }


    pub fn with_tag( mut self, tag: impl Into<String> ) -> Self {
        self.tags.insert( tag.into() );
        self
    }


    pub fn has_tag( &self, tag: &str ) -> bool {
        self.tags.contains( tag )
    }


    /// "Artist – Title" for songs with an artist, otherwise the title.
    pub fn display_name( &self ) -> String {
        match &self.artist {
            Some( artist ) => format!( "{} – {}", artist, self.title ),
            None => self.title.clone(),
        }
    }
}


impl From<String> for SegmentId {
    fn from( s: String ) -> Self {
        Self( s )
    }
}


/// Formats a duration as M:SS.
pub fn format_duration( d: Duration ) -> String {
    let secs = d.as_secs();
    format!( "{}:{:02}", secs / 60, secs % 60 )
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_priority_order() {
        let mut cats = vec![ Category::Advert, Category::Song, Category::Jingle, Category::DjLine ];
        cats.sort();
        assert_eq!( cats, Category::ALL.to_vec() );
        assert_eq!( Category::Song.priority(), 0 );
        assert_eq!( Category::Advert.priority(), 3 );
    }


    #[test]
    fn test_category_parse_aliases() {
        assert_eq!( "dj_line".parse::<Category>().unwrap(), Category::DjLine );
        assert_eq!( "Link".parse::<Category>().unwrap(), Category::DjLine );
        assert_eq!( "ad".parse::<Category>().unwrap(), Category::Advert );
        assert!( "news".parse::<Category>().is_err() );
    }


    #[test]
    fn test_category_serde_kebab_case() {
        let json = serde_json::to_string( &Category::DjLine ).unwrap();
        assert_eq!( json, "\"dj-line\"" );
    }


    #[test]
    fn test_display_name() {
        let song = Segment::new( "s1", Category::Song, Duration::from_secs( 200 ), "92.9 Night FM", "Night City" )
            .with_artist( "R.E.L.S." );
        assert_eq!( song.display_name(), "R.E.L.S. – Night City" );

        let jingle = Segment::new( "j1", Category::Jingle, Duration::from_secs( 5 ), "92.9 Night FM", "Jingle" );
        assert_eq!( jingle.display_name(), "Jingle" );
    }


    #[test]
    fn test_format_duration() {
        assert_eq!( format_duration( Duration::from_secs( 185 ) ), "3:05" );
        assert_eq!( format_duration( Duration::from_millis( 59_900 ) ), "0:59" );
    }
}
