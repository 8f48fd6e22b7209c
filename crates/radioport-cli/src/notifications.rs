//! Desktop notifications
//!
//! Pops up the station and "Artist – Title" whenever a song goes on air.

use std::thread;

use notify_rust::Notification;

use radioport_core::{ Category, Segment };


/// Text shown in a notification popup.
#[derive( Debug, Clone, PartialEq, Eq )]
pub struct NotificationMessage {
    /// Single line summarizing the content: the station.
    pub summary: String,
    pub body: String,
}


impl NotificationMessage {
    /// Message announcing `segment`. Only songs are announced.
    pub fn for_segment( segment: &Segment ) -> Option<Self> {
        if segment.category != Category::Song {
            return None;
        }

        Some( Self {
            summary: segment.station.clone(),
            body: segment.display_name(),
        })
    }
}


/// Sends song announcements to the desktop.
#[derive( Debug )]
pub struct Notifier {
    enabled: bool,
}


impl Notifier {
    pub fn new( enabled: bool ) -> Self {
        Self { enabled }
    }


    pub fn is_enabled( &self ) -> bool {
        self.enabled
    }


    pub fn set_enabled( &mut self, enabled: bool ) {
        self.enabled = enabled;
    }


    /// Shows a popup for a segment going on air. Returns the message sent.
    ///
    /// The notification server is contacted off the UI thread.
    pub fn announce( &self, segment: &Segment ) -> Option<NotificationMessage> {
        if !self.enabled {
            return None;
        }

        let message = NotificationMessage::for_segment( segment )?;
        let popup = message.clone();
        thread::spawn( move || {
            let result = Notification::new()
                .appname( "Radioport" )
                .summary( &popup.summary )
                .body( &popup.body )
                .show();
            if let Err( e ) = result {
                tracing::debug!( "Notification not shown: {}", e );
            }
        });

        Some( message )
    }
}


#[cfg( test )]
mod tests {
    use std::time::Duration;

    use super::*;


    #[test]
    fn test_song_message() {
        let song = Segment::new( "night/never_fade_away", Category::Song, Duration::from_secs( 200 ), "92.9 Night FM", "Never Fade Away" )
            .with_artist( "SAMURAI" );
        let message = NotificationMessage::for_segment( &song ).unwrap();
        assert_eq!( message.summary, "92.9 Night FM" );
        assert_eq!( message.body, "SAMURAI – Never Fade Away" );
    }


    #[test]
    fn test_untagged_song_uses_title() {
        let song = Segment::new( "growl/track_3", Category::Song, Duration::from_secs( 200 ), "89.7 Growl FM", "track 3" );
        assert_eq!( NotificationMessage::for_segment( &song ).unwrap().body, "track 3" );
    }


    #[test]
    fn test_breaks_are_not_announced() {
        for category in [ Category::Jingle, Category::DjLine, Category::Advert ] {
            let segment = Segment::new( "x", category, Duration::from_secs( 10 ), "92.9 Night FM", "x" );
            assert!( NotificationMessage::for_segment( &segment ).is_none() );
        }
    }


    #[test]
    fn test_disabled_notifier_sends_nothing() {
        let notifier = Notifier::new( false );
        let song = Segment::new( "s", Category::Song, Duration::from_secs( 10 ), "92.9 Night FM", "s" );
        assert!( notifier.announce( &song ).is_none() );
        assert!( !notifier.is_enabled() );
    }
}
