//! Built-in station table
//!
//! The in-game stations, in dial order, with what each one broadcasts
//! besides music.

use radioport_core::StationProfile;


/// A station on the dial.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub struct StationInfo {
    /// Frequency and name, also the station's folder name under `audio/stations`.
    pub name: &'static str,
    pub dj: Option<&'static str>,
    pub has_ads: bool,
    pub has_jingles: bool,
}


impl StationInfo {
    const fn music( name: &'static str ) -> Self {
        Self { name, dj: None, has_ads: true, has_jingles: true }
    }


    /// The frequency part of the name, e.g. "92.9".
    pub fn frequency( &self ) -> &'static str {
        self.name.split_once( ' ' ).map( |( f, _ )| f ).unwrap_or( self.name )
    }


    /// The name without its frequency, e.g. "Night FM".
    pub fn short_name( &self ) -> &'static str {
        self.name.split_once( ' ' ).map( |( _, n )| n ).unwrap_or( self.name )
    }


    /// Catalog profile for this station.
    pub fn profile( &self ) -> StationProfile {
        let mut profile = StationProfile::new( self.name );
        if let Some( dj ) = self.dj {
            profile = profile.with_dj( dj );
        }
        if !self.has_ads {
            profile = profile.without_ads();
        }
        if !self.has_jingles {
            profile = profile.without_jingles();
        }
        profile
    }
}


/// All stations, in dial order.
pub const STATIONS: &[StationInfo] = &[
    StationInfo::music( "88.9 Pacific Dreams" ),
    StationInfo::music( "89.3 Radio Vexelstrom" ),
    StationInfo { name: "89.7 Growl FM", dj: Some( "Ash" ), has_ads: false, has_jingles: true },
    StationInfo::music( "91.9 Royal Blue Radio" ),
    StationInfo::music( "92.9 Night FM" ),
    StationInfo::music( "95.2 Samizdat Radio" ),
    StationInfo::music( "96.1 Ritual FM" ),
    StationInfo::music( "98.7 Body Heat Radio" ),
    StationInfo { name: "99.9 Impulse", dj: None, has_ads: false, has_jingles: false },
    StationInfo::music( "101.9 The Dirge" ),
    StationInfo::music( "103.5 Radio PEBKAC" ),
    StationInfo::music( "106.9 30 Principales" ),
    StationInfo { name: "107.3 Morro Rock Radio", dj: Some( "Max Mike" ), has_ads: true, has_jingles: true },
    StationInfo::music( "107.5 Dark Star" ),
];


/// Finds a station by full name, frequency or part of its name.
pub fn find( query: &str ) -> Option<&'static StationInfo> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return None;
    }

    STATIONS.iter().find( |s| s.name.to_lowercase() == query )
        .or_else( || STATIONS.iter().find( |s| s.frequency() == query ) )
        .or_else( || STATIONS.iter().find( |s| s.name.to_lowercase().contains( &query ) ) )
}


/// Position of a station on the dial.
pub fn index_of( name: &str ) -> Option<usize> {
    STATIONS.iter().position( |s| s.name == name )
}


/// The station `offset` steps along the dial from `name`, wrapping around.
pub fn step( name: &str, offset: isize ) -> &'static StationInfo {
    let len = STATIONS.len() as isize;
    let current = index_of( name ).unwrap_or( 0 ) as isize;
    let index = ( current + offset ).rem_euclid( len ) as usize;
    &STATIONS[ index ]
}


#[cfg( test )]
mod tests {
    use radioport_core::Category;

    use super::*;


    #[test]
    fn test_table_has_fourteen_stations() {
        assert_eq!( STATIONS.len(), 14 );
        assert_eq!( STATIONS.iter().filter( |s| s.dj.is_some() ).count(), 2 );
    }


    #[test]
    fn test_profiles_follow_flags() {
        let growl = find( "growl" ).unwrap().profile();
        assert!( growl.categories().contains( &Category::DjLine ) );
        assert!( !growl.categories().contains( &Category::Advert ) );

        let impulse = find( "99.9" ).unwrap().profile();
        assert_eq!( impulse.categories().len(), 1 );
    }


    #[test]
    fn test_find_by_name_frequency_and_fragment() {
        assert_eq!( find( "92.9 Night FM" ).unwrap().name, "92.9 Night FM" );
        assert_eq!( find( "107.5" ).unwrap().name, "107.5 Dark Star" );
        assert_eq!( find( "pebkac" ).unwrap().name, "103.5 Radio PEBKAC" );
        assert!( find( "" ).is_none() );
        assert!( find( "kpop" ).is_none() );
    }


    #[test]
    fn test_step_wraps() {
        assert_eq!( step( "107.5 Dark Star", 1 ).name, "88.9 Pacific Dreams" );
        assert_eq!( step( "88.9 Pacific Dreams", -1 ).name, "107.5 Dark Star" );
        assert_eq!( step( "92.9 Night FM", 2 ).name, "96.1 Ritual FM" );
    }


    #[test]
    fn test_name_parts() {
        let station = find( "night" ).unwrap();
        assert_eq!( station.frequency(), "92.9" );
        assert_eq!( station.short_name(), "Night FM" );
    }
}
