//! Segment catalog
//!
//! Immutable registry of every segment a session may pick from, grouped by
//! station and category. Stations declare which categories they carry; a
//! carried category with no segments makes the station unplayable.

use std::collections::{ BTreeMap, BTreeSet, HashSet };
use std::time::Duration;

use serde::{ Deserialize, Serialize };
use thiserror::Error;

use crate::segment::{ Category, Segment, SegmentId };


/// Errors raised while building or validating a catalog.
#[derive( Debug, Clone, PartialEq, Eq, Error )]
pub enum CatalogError {
    #[error( "Unknown station: {0}" )]
    UnknownStation( String ),

    #[error( "Station '{station}' has no {category} segments" )]
    MissingCategory { station: String, category: Category },

    #[error( "Duplicate segment id: {0}" )]
    DuplicateSegment( SegmentId ),

    #[error( "Segment '{0}' has zero duration" )]
    ZeroDuration( SegmentId ),
}


/// What a station broadcasts besides music.
#[derive( Debug, Clone, PartialEq, Eq, Serialize, Deserialize )]
pub struct StationProfile {
    pub name: String,
    /// Name of the station's DJ, if it has one.
    #[serde( default, skip_serializing_if = "Option::is_none" )]
    pub dj: Option<String>,
    #[serde( default = "default_true" )]
    pub has_ads: bool,
    #[serde( default = "default_true" )]
    pub has_jingles: bool,
}


fn default_true() -> bool {
    true
}


impl StationProfile {
    /// A music station with jingles and adverts but no DJ.
    pub fn new( name: impl Into<String> ) -> Self {
        Self {
            name: name.into(),
            dj: None,
            has_ads: true,
            has_jingles: true,
        }
    }


    pub fn with_dj( mut self, dj: impl Into<String> ) -> Self {
        self.dj = Some( dj.into() );
        self
    }


    pub fn without_ads( mut self ) -> Self {
        self.has_ads = false;
        self
    }


    pub fn without_jingles( mut self ) -> Self {
        self.has_jingles = false;
        self
    }


    /// Categories this station puts on air.
    pub fn categories( &self ) -> BTreeSet<Category> {
        let mut set = BTreeSet::new();
        set.insert( Category::Song );
        if self.dj.is_some() {
            set.insert( Category::DjLine );
        }
        if self.has_jingles {
            set.insert( Category::Jingle );
        }
        if self.has_ads {
            set.insert( Category::Advert );
        }
        set
    }
}


#[derive( Debug, Default )]
struct StationEntry {
    profile: Option<StationProfile>,
    segments: BTreeMap<Category, Vec<Segment>>,
}


/// Read-only segment registry.
#[derive( Debug, Default )]
pub struct Catalog {
    stations: BTreeMap<String, StationEntry>,
}


impl Catalog {
    /// Starts building a catalog.
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }


    /// Segments of one category for a station, in load order.
    ///
    /// Returns an empty slice for unknown stations or absent categories.
    pub fn segments_for( &self, station: &str, category: Category ) -> &[Segment] {
        self.stations
            .get( station )
            .and_then( |s| s.segments.get( &category ) )
            .map( |v| v.as_slice() )
            .unwrap_or( &[] )
    }


    /// Categories the station carries, according to its profile.
    pub fn all_categories( &self, station: &str ) -> BTreeSet<Category> {
        self.profile( station )
            .map( StationProfile::categories )
            .unwrap_or_default()
    }


    /// Gets a station's profile.
    pub fn profile( &self, station: &str ) -> Option<&StationProfile> {
        self.stations.get( station ).and_then( |s| s.profile.as_ref() )
    }


    /// Names of all stations with a profile, sorted.
    pub fn stations( &self ) -> impl Iterator<Item = &str> {
        self.stations
            .iter()
            .filter( |( _, entry )| entry.profile.is_some() )
            .map( |( name, _ )| name.as_str() )
    }


    /// Looks up a segment by id within a station.
    pub fn segment( &self, station: &str, id: &SegmentId ) -> Option<&Segment> {
        self.stations
            .get( station )?
            .segments
            .values()
            .flat_map( |v| v.iter() )
            .find( |s| &s.id == id )
    }


    /// Total number of segments across all stations.
    pub fn len( &self ) -> usize {
        self.stations
            .values()
            .flat_map( |s| s.segments.values() )
            .map( Vec::len )
            .sum()
    }


    pub fn is_empty( &self ) -> bool {
        self.len() == 0
    }


    /// Checks that a station exists and has segments for every category it
    /// carries. Rotation cannot satisfy its rules otherwise.
    pub fn validate( &self, station: &str ) -> Result<(), CatalogError> {
        let profile = self.profile( station )
            .ok_or_else( || CatalogError::UnknownStation( station.to_string() ) )?;

        for category in profile.categories() {
            if self.segments_for( station, category ).is_empty() {
                return Err( CatalogError::MissingCategory {
                    station: station.to_string(),
                    category,
                });
            }
        }

        Ok(())
    }
}


/// Incremental catalog construction.
#[derive( Debug, Default )]
pub struct CatalogBuilder {
    stations: BTreeMap<String, StationEntry>,
    shared_adverts: Vec<Segment>,
    ids: HashSet<SegmentId>,
}


impl CatalogBuilder {
    /// Registers (or replaces) a station profile.
    pub fn add_station( &mut self, profile: StationProfile ) -> &mut Self {
        let entry = self.stations.entry( profile.name.clone() ).or_default();
        entry.profile = Some( profile );
        self
    }


    /// Adds a segment to the station named in `segment.station`.
    pub fn add_segment( &mut self, segment: Segment ) -> Result<&mut Self, CatalogError> {
        Self::check( &segment )?;
        if !self.ids.insert( segment.id.clone() ) {
            return Err( CatalogError::DuplicateSegment( segment.id ) );
        }

        self.stations
            .entry( segment.station.clone() )
            .or_default()
            .segments
            .entry( segment.category )
            .or_default()
            .push( segment );
        Ok( self )
    }


    /// Adds an advert that every ad-carrying station broadcasts.
    pub fn add_shared_advert( &mut self, mut segment: Segment ) -> Result<&mut Self, CatalogError> {
        segment.category = Category::Advert;
        Self::check( &segment )?;
        if !self.ids.insert( segment.id.clone() ) {
            return Err( CatalogError::DuplicateSegment( segment.id ) );
        }
        self.shared_adverts.push( segment );
        Ok( self )
    }


    /// Finishes the catalog, distributing shared adverts.
    pub fn build( mut self ) -> Catalog {
        let shared = std::mem::take( &mut self.shared_adverts );

        for ( name, entry ) in self.stations.iter_mut() {
            let carries_ads = entry.profile.as_ref().map( |p| p.has_ads ).unwrap_or( false );
            if !carries_ads || shared.is_empty() {
                continue;
            }

            let adverts = entry.segments.entry( Category::Advert ).or_default();
            for advert in &shared {
                let mut advert = advert.clone();
                advert.station = name.clone();
                adverts.push( advert );
            }
        }

        tracing::debug!(
            "Catalog built: {} stations, {} shared adverts",
            self.stations.len(),
            shared.len()
        );

        Catalog { stations: self.stations }
    }


    fn check( segment: &Segment ) -> Result<(), CatalogError> {
        if segment.duration == Duration::ZERO {
            return Err( CatalogError::ZeroDuration( segment.id.clone() ) );
        }
        Ok(())
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    fn seg( id: &str, category: Category, station: &str ) -> Segment {
        Segment::new( id, category, Duration::from_secs( 30 ), station, id )
    }


    fn night_fm() -> CatalogBuilder {
        let mut builder = Catalog::builder();
        builder.add_station( StationProfile::new( "Night FM" ) );
        builder.add_segment( seg( "s1", Category::Song, "Night FM" ) ).unwrap();
        builder.add_segment( seg( "s2", Category::Song, "Night FM" ) ).unwrap();
        builder.add_segment( seg( "j1", Category::Jingle, "Night FM" ) ).unwrap();
        builder
    }


    #[test]
    fn test_segments_for_groups_by_category() {
        let mut builder = night_fm();
        builder.add_shared_advert( seg( "a1", Category::Advert, "" ) ).unwrap();
        let catalog = builder.build();

        let songs: Vec<_> = catalog.segments_for( "Night FM", Category::Song ).iter().map( |s| s.id.as_str() ).collect();
        assert_eq!( songs, vec![ "s1", "s2" ] );
        assert_eq!( catalog.segments_for( "Night FM", Category::Advert ).len(), 1 );
        assert_eq!( catalog.segments_for( "Night FM", Category::Advert )[ 0 ].station, "Night FM" );
        assert!( catalog.segments_for( "Nowhere", Category::Song ).is_empty() );
    }


    #[test]
    fn test_all_categories_follows_profile() {
        let mut builder = Catalog::builder();
        builder.add_station( StationProfile::new( "Growl FM" ).with_dj( "Ash" ).without_ads() );
        builder.add_station( StationProfile::new( "Impulse" ).without_ads().without_jingles() );
        let catalog = builder.build();

        let growl: Vec<_> = catalog.all_categories( "Growl FM" ).into_iter().collect();
        assert_eq!( growl, vec![ Category::Song, Category::DjLine, Category::Jingle ] );

        let impulse: Vec<_> = catalog.all_categories( "Impulse" ).into_iter().collect();
        assert_eq!( impulse, vec![ Category::Song ] );
    }


    #[test]
    fn test_validate_missing_jingles() {
        let mut builder = Catalog::builder();
        builder.add_station( StationProfile::new( "Dark Star" ).without_ads() );
        builder.add_segment( seg( "s1", Category::Song, "Dark Star" ) ).unwrap();
        let catalog = builder.build();

        assert_eq!(
            catalog.validate( "Dark Star" ),
            Err( CatalogError::MissingCategory { station: "Dark Star".into(), category: Category::Jingle } )
        );
    }


    #[test]
    fn test_validate_unknown_station() {
        let catalog = night_fm().build();
        assert!( matches!( catalog.validate( "Ghost FM" ), Err( CatalogError::UnknownStation( _ ) ) ) );
    }


    #[test]
    fn test_validate_requires_adverts_when_station_runs_ads() {
        let catalog = night_fm().build();
        assert!( matches!(
            catalog.validate( "Night FM" ),
            Err( CatalogError::MissingCategory { category: Category::Advert, .. } )
        ));
    }


    #[test]
    fn test_rejects_duplicate_and_zero_duration() {
        let mut builder = night_fm();
        assert!( matches!(
            builder.add_segment( seg( "s1", Category::Song, "Night FM" ) ),
            Err( CatalogError::DuplicateSegment( _ ) )
        ));

        let silent = Segment::new( "z", Category::Song, Duration::ZERO, "Night FM", "z" );
        assert!( matches!( builder.add_segment( silent ), Err( CatalogError::ZeroDuration( _ ) ) ) );
    }


    #[test]
    fn test_shared_adverts_skip_ad_free_stations() {
        let mut builder = Catalog::builder();
        builder.add_station( StationProfile::new( "Growl FM" ).with_dj( "Ash" ).without_ads() );
        builder.add_shared_advert( seg( "a1", Category::Advert, "" ) ).unwrap();
        let catalog = builder.build();
        assert!( catalog.segments_for( "Growl FM", Category::Advert ).is_empty() );
    }


    #[test]
    fn test_segment_lookup() {
        let catalog = night_fm().build();
        let found = catalog.segment( "Night FM", &SegmentId::from( "j1" ) ).unwrap();
        assert_eq!( found.category, Category::Jingle );
        assert_eq!( catalog.len(), 3 );
        assert_eq!( catalog.stations().collect::<Vec<_>>(), vec![ "Night FM" ] );
    }
}
