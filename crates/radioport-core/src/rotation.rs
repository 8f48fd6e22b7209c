//! Rotation policy
//!
//! Decides what goes on air next: first a category, then a segment within it.
//! The policy is a pure function of the catalog, the session state and the
//! random source; it never mutates the session.
//!
//! Adverts air one at a time. The multi-advert breaks of a real station are
//! flattened into single adverts held apart by the advert spacing rule, so a
//! listener never sits through a block of ads back to back.

use std::cmp::Reverse;

use thiserror::Error;

use crate::catalog::Catalog;
use crate::config::RotationConfig;
use crate::segment::{ Category, Segment };
use crate::session::SessionState;


/// Errors from a single pick.
#[derive( Debug, Clone, PartialEq, Eq, Error )]
pub enum RotationError {
    #[error( "No {category} segments available on '{station}'" )]
    Exhausted { station: String, category: Category },

    #[error( "Station '{0}' carries no categories" )]
    NoCategories( String ),
}


/// Picks segments according to a [`RotationConfig`].
#[derive( Debug, Clone )]
pub struct RotationPolicy {
    config: RotationConfig,
}


impl RotationPolicy {
    pub fn new( config: RotationConfig ) -> Self {
        Self { config }
    }


    pub fn config( &self ) -> &RotationConfig {
        &self.config
    }


    /// Categories that may play next, highest priority first.
    ///
    /// A category is eligible once its since-last-play counter reaches its
    /// minimum spacing. When nothing is eligible the carried category with the
    /// largest counter is returned alone, ties going to the higher priority.
    pub fn eligible_categories(
        &self,
        catalog: &Catalog,
        state: &SessionState,
    ) -> Result<Vec<Category>, RotationError> {
        let carried = catalog.all_categories( state.station() );
        if carried.is_empty() {
            return Err( RotationError::NoCategories( state.station().to_string() ) );
        }

        let eligible: Vec<Category> = carried
            .iter()
            .copied()
            .filter( |&c| state.since_last( c ) >= self.config.rule( c ).min_spacing )
            .collect();

        if !eligible.is_empty() {
            return Ok( eligible );
        }

        let fallback = carried
            .iter()
            .copied()
            .max_by_key( |&c| ( state.since_last( c ), Reverse( c.priority() ) ) )
            .ok_or_else( || RotationError::NoCategories( state.station().to_string() ) )?;

        tracing::debug!( "No category eligible on '{}', falling back to {}", state.station(), fallback );
        Ok( vec![ fallback ] )
    }


    /// Weighted random choice among `eligible`.
    ///
    /// Categories with a zero weight are never drawn unless every weight is
    /// zero, in which case the first (highest priority) category wins.
    pub fn choose_category( &self, eligible: &[Category], rng: &mut fastrand::Rng ) -> Option<Category> {
        let first = *eligible.first()?;

        let total: f64 = eligible
            .iter()
            .map( |&c| self.config.rule( c ).weight )
            .filter( |w| *w > 0.0 )
            .sum();

        if total <= 0.0 {
            return Some( first );
        }

        let mut target = rng.f64() * total;
        let mut last_weighted = first;
        for &category in eligible {
            let weight = self.config.rule( category ).weight;
            if weight <= 0.0 {
                continue;
            }
            if target < weight {
                return Some( category );
            }
            target -= weight;
            last_weighted = category;
        }

        // Float rounding can leave a sliver of `target`
        Some( last_weighted )
    }


    /// Picks the next segment for the session.
    pub fn pick(
        &self,
        catalog: &Catalog,
        state: &SessionState,
        rng: &mut fastrand::Rng,
    ) -> Result<Segment, RotationError> {
        let eligible = self.eligible_categories( catalog, state )?;
        let category = self.choose_category( &eligible, rng )
            .ok_or_else( || RotationError::NoCategories( state.station().to_string() ) )?;
        self.pick_from( category, catalog, state, rng )
    }


    /// Picks a segment of a given category, honouring the no-repeat window.
    ///
    /// Segments that failed this session are never returned. If the window
    /// excludes every remaining candidate it is lifted for this pick.
    pub fn pick_from(
        &self,
        category: Category,
        catalog: &Catalog,
        state: &SessionState,
        rng: &mut fastrand::Rng,
    ) -> Result<Segment, RotationError> {
        let candidates: Vec<&Segment> = catalog
            .segments_for( state.station(), category )
            .iter()
            .filter( |s| !state.is_failed( &s.id ) )
            .collect();

        if candidates.is_empty() {
            return Err( RotationError::Exhausted {
                station: state.station().to_string(),
                category,
            });
        }

        // A window of N means any N consecutive picks are distinct
        let window = self.config.no_repeat_window.saturating_sub( 1 );
        let fresh: Vec<&Segment> = candidates
            .iter()
            .copied()
            .filter( |s| !state.history().contains_recent( &s.id, window ) )
            .collect();

        let pool = if fresh.is_empty() {
            tracing::debug!(
                "All {} {} segments inside the no-repeat window, lifting it for one pick",
                candidates.len(),
                category
            );
            candidates
        } else {
            fresh
        };

        let chosen = pool[ rng.usize( ..pool.len() ) ];
        tracing::debug!( "Picked {} '{}'", category, chosen.id );
        Ok( chosen.clone() )
    }


    /// Recovery pick used when a regular pick fails.
    ///
    /// Ignores spacing and the no-repeat window and walks the carried
    /// categories in priority order. Failed segments are only considered when
    /// nothing else is left.
    pub fn pick_relaxed(
        &self,
        catalog: &Catalog,
        state: &SessionState,
        rng: &mut fastrand::Rng,
    ) -> Result<Segment, RotationError> {
        let carried = catalog.all_categories( state.station() );

        for allow_failed in [ false, true ] {
            for &category in &carried {
                let pool: Vec<&Segment> = catalog
                    .segments_for( state.station(), category )
                    .iter()
                    .filter( |s| allow_failed || !state.is_failed( &s.id ) )
                    .collect();

                if !pool.is_empty() {
                    return Ok( pool[ rng.usize( ..pool.len() ) ].clone() );
                }
            }
        }

        Err( RotationError::NoCategories( state.station().to_string() ) )
    }
}


#[cfg( test )]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::*;
    use crate::catalog::StationProfile;
    use crate::config::CategoryRule;


    const STATION: &str = "98.7 Body Heat Radio";


    fn seg( id: &str, category: Category ) -> Segment {
        Segment::new( id, category, Duration::from_secs( 60 ), STATION, id )
    }


    fn catalog( songs: usize, jingles: usize, djs: usize, adverts: usize ) -> Catalog {
        let mut profile = StationProfile::new( STATION );
        if djs > 0 {
            profile = profile.with_dj( "Stanley" );
        }
        if adverts == 0 {
            profile = profile.without_ads();
        }
        if jingles == 0 {
            profile = profile.without_jingles();
        }

        let mut builder = Catalog::builder();
        builder.add_station( profile );
        for ( category, count, prefix ) in [
            ( Category::Song, songs, "s" ),
            ( Category::Jingle, jingles, "j" ),
            ( Category::DjLine, djs, "d" ),
            ( Category::Advert, adverts, "a" ),
        ] {
            for i in 0..count {
                builder.add_segment( seg( &format!( "{}{}", prefix, i ), category ) ).unwrap();
            }
        }
        builder.build()
    }


    /// Runs `n` picks, committing each to the session as the scheduler would.
    fn run_picks( policy: &RotationPolicy, catalog: &Catalog, seed: u64, n: usize ) -> Vec<Segment> {
        let mut state = SessionState::new( STATION, policy.config() );
        let mut rng = fastrand::Rng::with_seed( seed );
        let mut picks = Vec::with_capacity( n );
        for _ in 0..n {
            let segment = policy.pick( catalog, &state, &mut rng ).unwrap();
            state.record( &segment );
            picks.push( segment );
        }
        picks
    }


    #[test]
    fn test_spacing_holds_over_1000_picks() {
        let catalog = catalog( 20, 4, 6, 5 );
        let config = RotationConfig {
            song: CategoryRule::new( 0, 0.4 ),
            dj_line: CategoryRule::new( 2, 0.2 ),
            jingle: CategoryRule::new( 3, 0.2 ),
            advert: CategoryRule::new( 4, 0.2 ),
            ..Default::default()
        };
        let policy = RotationPolicy::new( config.clone() );
        let picks = run_picks( &policy, &catalog, 7, 1000 );

        let mut last_seen: HashMap<Category, usize> = HashMap::new();
        for ( pos, segment ) in picks.iter().enumerate() {
            if let Some( prev ) = last_seen.insert( segment.category, pos ) {
                let spacing = config.rule( segment.category ).min_spacing as usize;
                assert!(
                    pos - prev > spacing,
                    "{} at {} and {} closer than {}",
                    segment.category, prev, pos, spacing
                );
            }
        }
        assert!( last_seen.contains_key( &Category::Jingle ) );
        assert!( last_seen.contains_key( &Category::Advert ) );
    }


    #[test]
    fn test_adverts_air_singly_with_defaults() {
        let catalog = catalog( 12, 3, 0, 6 );
        let policy = RotationPolicy::new( RotationConfig::default() );
        let picks = run_picks( &policy, &catalog, 11, 500 );

        assert!( picks.iter().any( |s| s.category == Category::Advert ) );
        for pair in picks.windows( 2 ) {
            assert!( !( pair[ 0 ].category == Category::Advert && pair[ 1 ].category == Category::Advert ) );
        }
    }


    #[test]
    fn test_no_repeat_within_window() {
        let catalog = catalog( 12, 10, 10, 10 );
        let config = RotationConfig { no_repeat_window: 8, ..Default::default() };
        let window = config.no_repeat_window;
        let policy = RotationPolicy::new( config );
        let picks = run_picks( &policy, &catalog, 99, 500 );

        for slice in picks.windows( window ) {
            let mut ids: Vec<_> = slice.iter().map( |s| s.id.clone() ).collect();
            ids.sort();
            ids.dedup();
            assert_eq!( ids.len(), window, "repeat inside window: {:?}", slice.iter().map( |s| &s.id ).collect::<Vec<_>>() );
        }
    }


    #[test]
    fn test_small_catalog_lifts_window() {
        let catalog = catalog( 2, 0, 0, 0 );
        let policy = RotationPolicy::new( RotationConfig::default() );
        let picks = run_picks( &policy, &catalog, 3, 10 );
        assert_eq!( picks.len(), 10 );
        assert!( picks.iter().all( |s| s.category == Category::Song ) );
    }


    #[test]
    fn test_jingle_scenario_with_fixed_seed() {
        let catalog = catalog( 3, 1, 0, 0 );
        let config = RotationConfig {
            song: CategoryRule::new( 0, 0.9 ),
            jingle: CategoryRule::new( 2, 0.1 ),
            ..Default::default()
        };
        let policy = RotationPolicy::new( config );

        for seed in [ 1, 2, 3, 42, 2077 ] {
            let picks = run_picks( &policy, &catalog, seed, 5 );
            let jingle_positions: Vec<usize> = picks
                .iter()
                .enumerate()
                .filter( |( _, s )| s.id.as_str() == "j0" )
                .map( |( i, _ )| i )
                .collect();

            assert!( jingle_positions.len() <= 2 );
            for pair in jingle_positions.windows( 2 ) {
                assert!( pair[ 1 ] - pair[ 0 ] > 1 );
            }
        }
    }


    #[test]
    fn test_fixed_seed_is_reproducible() {
        let catalog = catalog( 10, 3, 3, 3 );
        let policy = RotationPolicy::new( RotationConfig::default() );
        let a: Vec<_> = run_picks( &policy, &catalog, 2077, 50 ).into_iter().map( |s| s.id ).collect();
        let b: Vec<_> = run_picks( &policy, &catalog, 2077, 50 ).into_iter().map( |s| s.id ).collect();
        assert_eq!( a, b );
    }


    #[test]
    fn test_fallback_prefers_largest_counter_then_priority() {
        let catalog = catalog( 3, 2, 0, 0 );
        let config = RotationConfig {
            song: CategoryRule::new( 5, 1.0 ),
            jingle: CategoryRule::new( 5, 1.0 ),
            ..Default::default()
        };
        let policy = RotationPolicy::new( config );
        let mut state = SessionState::new( STATION, policy.config() );

        state.record( &seg( "s0", Category::Song ) );
        // song 0, jingle 6: nothing eligible except jingle
        assert_eq!( policy.eligible_categories( &catalog, &state ).unwrap(), vec![ Category::Jingle ] );

        state.record( &seg( "j0", Category::Jingle ) );
        // song 1, jingle 0: nothing reaches 5, song has the larger counter
        assert_eq!( policy.eligible_categories( &catalog, &state ).unwrap(), vec![ Category::Song ] );
    }


    #[test]
    fn test_fallback_tie_goes_to_priority() {
        let catalog = catalog( 3, 2, 2, 0 );
        let config = RotationConfig {
            song: CategoryRule::new( 9, 1.0 ),
            dj_line: CategoryRule::new( 9, 1.0 ),
            jingle: CategoryRule::new( 9, 1.0 ),
            ..Default::default()
        };
        let policy = RotationPolicy::new( config );
        let mut state = SessionState::new( STATION, policy.config() );
        state.record( &seg( "a", Category::Advert ) );
        // every carried counter is now 10 > 9, all eligible
        assert_eq!( policy.eligible_categories( &catalog, &state ).unwrap().len(), 3 );

        let mut state = SessionState::new( STATION, &RotationConfig::default() );
        state.record( &seg( "s0", Category::Song ) );
        state.record( &seg( "j0", Category::Jingle ) );
        state.record( &seg( "d0", Category::DjLine ) );
        // song 2, jingle 1, dj 0 under spacing 9: song wins on counter
        assert_eq!( policy.eligible_categories( &catalog, &state ).unwrap(), vec![ Category::Song ] );

        let flat = RotationConfig {
            song: CategoryRule::new( 1, 1.0 ),
            dj_line: CategoryRule::new( 1, 1.0 ),
            jingle: CategoryRule::new( 1, 1.0 ),
            ..Default::default()
        };
        let state = SessionState::new( STATION, &flat );
        // all three counters sit at 1 under spacing 9
        assert_eq!( policy.eligible_categories( &catalog, &state ).unwrap(), vec![ Category::Song ] );
    }


    #[test]
    fn test_choose_category_respects_weights() {
        let config = RotationConfig {
            song: CategoryRule::new( 0, 1.0 ),
            jingle: CategoryRule::new( 0, 0.0 ),
            ..Default::default()
        };
        let policy = RotationPolicy::new( config );
        let mut rng = fastrand::Rng::with_seed( 5 );
        for _ in 0..200 {
            let chosen = policy.choose_category( &[ Category::Song, Category::Jingle ], &mut rng );
            assert_eq!( chosen, Some( Category::Song ) );
        }
    }


    #[test]
    fn test_choose_category_all_zero_weights_takes_priority() {
        let config = RotationConfig {
            dj_line: CategoryRule::new( 0, 0.0 ),
            jingle: CategoryRule::new( 0, 0.0 ),
            ..Default::default()
        };
        let policy = RotationPolicy::new( config );
        let mut rng = fastrand::Rng::with_seed( 1 );
        assert_eq!( policy.choose_category( &[ Category::DjLine, Category::Jingle ], &mut rng ), Some( Category::DjLine ) );
        assert_eq!( policy.choose_category( &[], &mut rng ), None );
    }


    #[test]
    fn test_failed_segments_are_not_retried() {
        let catalog = catalog( 2, 0, 0, 0 );
        let policy = RotationPolicy::new( RotationConfig::default() );
        let mut state = SessionState::new( STATION, policy.config() );
        state.mark_failed( "s0".into() );

        let mut rng = fastrand::Rng::with_seed( 11 );
        for _ in 0..20 {
            let segment = policy.pick( &catalog, &state, &mut rng ).unwrap();
            assert_eq!( segment.id.as_str(), "s1" );
        }

        state.mark_failed( "s1".into() );
        assert!( matches!(
            policy.pick( &catalog, &state, &mut rng ),
            Err( RotationError::Exhausted { category: Category::Song, .. } )
        ));

        // the recovery pick still finds something rather than stalling
        assert!( policy.pick_relaxed( &catalog, &state, &mut rng ).is_ok() );
    }


    #[test]
    fn test_unknown_station_has_no_categories() {
        let catalog = catalog( 1, 0, 0, 0 );
        let policy = RotationPolicy::new( RotationConfig::default() );
        let state = SessionState::new( "Nowhere", policy.config() );
        let mut rng = fastrand::Rng::with_seed( 0 );
        assert!( matches!( policy.pick( &catalog, &state, &mut rng ), Err( RotationError::NoCategories( _ ) ) ) );
        assert!( policy.pick_relaxed( &catalog, &state, &mut rng ).is_err() );
    }
}
