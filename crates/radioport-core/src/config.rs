//! Rotation configuration
//!
//! The flat set of named options that shape a station's rotation. Every field
//! has a default, so a partial settings table deserializes cleanly.

use serde::{ Deserialize, Serialize };
use thiserror::Error;

use crate::segment::Category;


/// Errors for out-of-range configuration values.
#[derive( Debug, Clone, PartialEq, Error )]
pub enum ConfigError {
    #[error( "lookahead must be at least 1" )]
    ZeroLookahead,

    #[error( "Invalid weight {weight} for {category}: weights must be finite and non-negative" )]
    InvalidWeight { category: Category, weight: f64 },

    #[error( "history_window ({history}) must be at least no_repeat_window ({no_repeat})" )]
    HistoryTooShort { history: usize, no_repeat: usize },
}


/// Spacing and weight for one category.
#[derive( Debug, Clone, Copy, PartialEq, Serialize, Deserialize )]
pub struct CategoryRule {
    /// Segments of other categories that must play between two of this one.
    pub min_spacing: u32,
    /// Relative selection weight among eligible categories.
    pub weight: f64,
}


impl CategoryRule {
    pub const fn new( min_spacing: u32, weight: f64 ) -> Self {
        Self { min_spacing, weight }
    }
}


/// Rotation options.
#[derive( Debug, Clone, PartialEq, Serialize, Deserialize )]
#[serde( default )]
pub struct RotationConfig {
    pub song: CategoryRule,
    pub dj_line: CategoryRule,
    pub jingle: CategoryRule,
    pub advert: CategoryRule,

    /// Picks before the same segment may be chosen again.
    pub no_repeat_window: usize,

    /// Number of played segments kept in the session history.
    pub history_window: usize,

    /// Number of future segments kept resolved in the queue.
    pub lookahead: usize,

    /// Fixed random seed. A time-based seed is used when absent.
    #[serde( skip_serializing_if = "Option::is_none" )]
    pub seed: Option<u64>,

    /// Open the session with a jingle when the station has any.
    pub start_with_jingle: bool,

    /// Open the session part-way through a song, like switching on a radio.
    pub tune_in: bool,
}


impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            song: CategoryRule::new( 0, 0.70 ),
            dj_line: CategoryRule::new( 2, 0.15 ),
            jingle: CategoryRule::new( 3, 0.10 ),
            advert: CategoryRule::new( 4, 0.05 ),
            no_repeat_window: 8,
            history_window: 32,
            lookahead: 2,
            seed: None,
            start_with_jingle: false,
            tune_in: true,
        }
    }
}


impl RotationConfig {
    /// Rule for a category.
    pub fn rule( &self, category: Category ) -> CategoryRule {
        match category {
            Category::Song => self.song,
            Category::DjLine => self.dj_line,
            Category::Jingle => self.jingle,
            Category::Advert => self.advert,
        }
    }


    /// Mutable rule for a category.
    pub fn rule_mut( &mut self, category: Category ) -> &mut CategoryRule {
        match category {
            Category::Song => &mut self.song,
            Category::DjLine => &mut self.dj_line,
            Category::Jingle => &mut self.jingle,
            Category::Advert => &mut self.advert,
        }
    }


    /// Checks value ranges.
    pub fn validate( &self ) -> Result<(), ConfigError> {
        if self.lookahead == 0 {
            return Err( ConfigError::ZeroLookahead );
        }

        for category in Category::ALL {
            let weight = self.rule( category ).weight;
            if !weight.is_finite() || weight < 0.0 {
                return Err( ConfigError::InvalidWeight { category, weight } );
            }
        }

        if self.history_window < self.no_repeat_window {
            return Err( ConfigError::HistoryTooShort {
                history: self.history_window,
                no_repeat: self.no_repeat_window,
            });
        }

        Ok(())
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_defaults_are_valid() {
        let config = RotationConfig::default();
        assert!( config.validate().is_ok() );
        assert_eq!( config.rule( Category::Jingle ).min_spacing, 3 );
        assert!( config.song.weight > config.advert.weight );
    }


    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "jingle": { "min_spacing": 5, "weight": 0.2 }, "seed": 42 }"#;
        let config: RotationConfig = serde_json::from_str( json ).unwrap();
        assert_eq!( config.jingle, CategoryRule::new( 5, 0.2 ) );
        assert_eq!( config.seed, Some( 42 ) );
        assert_eq!( config.lookahead, 2 );
        assert!( config.tune_in );
    }


    #[test]
    fn test_validate_rejects_zero_lookahead() {
        let config = RotationConfig { lookahead: 0, ..Default::default() };
        assert_eq!( config.validate(), Err( ConfigError::ZeroLookahead ) );
    }


    #[test]
    fn test_validate_rejects_negative_weight() {
        let mut config = RotationConfig::default();
        config.rule_mut( Category::Advert ).weight = -1.0;
        assert!( matches!( config.validate(), Err( ConfigError::InvalidWeight { category: Category::Advert, .. } ) ) );
    }


    #[test]
    fn test_validate_rejects_short_history() {
        let config = RotationConfig { no_repeat_window: 10, history_window: 4, ..Default::default() };
        assert!( matches!( config.validate(), Err( ConfigError::HistoryTooShort { .. } ) ) );
    }
}
