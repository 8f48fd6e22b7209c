//! System media transport controls integration
//!
//! Publishes what is on air to the OS media overlay and turns its buttons
//! into radio commands:
//! - Linux: MPRIS over D-Bus
//! - Windows: System Media Transport Controls (SMTC), bound to a hidden window
//! - macOS: Now Playing

use std::sync::mpsc::Sender;
use std::time::Duration;

use souvlaki::{ MediaControlEvent, MediaControls, MediaMetadata, MediaPlayback, MediaPosition, PlatformConfig };

use radioport_core::NowPlaying;


#[cfg( target_os = "windows" )]
mod platform {
    use std::ffi::c_void;

    use windows::core::{ HSTRING, PCWSTR };
    use windows::Win32::Foundation::{ GetLastError, HINSTANCE, HWND, LPARAM, LRESULT, WPARAM };
    use windows::Win32::UI::Shell::SetCurrentProcessExplicitAppUserModelID;
    use windows::Win32::UI::WindowsAndMessaging::{
        CreateWindowExW, DefWindowProcW, RegisterClassW,
        CS_HREDRAW, CS_VREDRAW, CW_USEDEFAULT, WINDOW_EX_STYLE, WNDCLASSW, WS_OVERLAPPEDWINDOW,
    };

    const ERROR_CLASS_ALREADY_EXISTS: u32 = 1410;


    unsafe extern "system" fn wnd_proc( hwnd: HWND, msg: u32, wparam: WPARAM, lparam: LPARAM ) -> LRESULT {
        DefWindowProcW( hwnd, msg, wparam, lparam )
    }


    /// Hidden window SMTC attaches to. Console windows are not accepted.
    pub struct Window( HWND );


    impl Window {
        pub fn handle( &self ) -> Option<*mut c_void> {
            Some( self.0 .0 as *mut c_void )
        }
    }


    pub fn create_window() -> Option<Window> {
        unsafe {
            let app_id = HSTRING::from( "Radioport.Radio" );
            let _ = SetCurrentProcessExplicitAppUserModelID( &app_id );

            let class_name: Vec<u16> = "RadioportSMTC\0".encode_utf16().collect();
            let wc = WNDCLASSW {
                style: CS_HREDRAW | CS_VREDRAW,
                lpfnWndProc: Some( wnd_proc ),
                hInstance: HINSTANCE::default(),
                lpszClassName: PCWSTR( class_name.as_ptr() ),
                ..Default::default()
            };

            // Re-enabling the controls registers the class a second time
            if RegisterClassW( &wc ) == 0 {
                let error = GetLastError();
                if error.0 != ERROR_CLASS_ALREADY_EXISTS {
                    tracing::warn!( "Failed to register SMTC window class: {:?}", error );
                    return None;
                }
            }

            let window_name: Vec<u16> = "Radioport\0".encode_utf16().collect();
            let hwnd = match CreateWindowExW(
                WINDOW_EX_STYLE::default(),
                PCWSTR( class_name.as_ptr() ),
                PCWSTR( window_name.as_ptr() ),
                WS_OVERLAPPEDWINDOW,
                CW_USEDEFAULT,
                CW_USEDEFAULT,
                CW_USEDEFAULT,
                CW_USEDEFAULT,
                HWND::default(),
                None,
                None,
                None,
            ) {
                Ok( hwnd ) => hwnd,
                Err( e ) => {
                    tracing::warn!( "Failed to create SMTC window: {:?}", e );
                    return None;
                }
            };

            if hwnd.0.is_null() {
                return None;
            }
            Some( Window( hwnd ) )
        }
    }
}


#[cfg( not( target_os = "windows" ) )]
mod platform {
    use std::ffi::c_void;


    /// MPRIS and macOS need no window.
    pub struct Window;


    impl Window {
        pub fn handle( &self ) -> Option<*mut c_void> {
            None
        }
    }


    pub fn create_window() -> Option<Window> {
        Some( Window )
    }
}


/// Commands coming from the OS media overlay.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum MediaCommand {
    Play,
    Pause,
    Toggle,
    Stop,
    /// Next station on the dial.
    Next,
    /// Previous station on the dial.
    Previous,
}


impl MediaCommand {
    /// Radio command for an overlay event. Seeking has no meaning on air.
    pub fn from_event( event: &MediaControlEvent ) -> Option<Self> {
        match event {
            MediaControlEvent::Play => Some( MediaCommand::Play ),
            MediaControlEvent::Pause => Some( MediaCommand::Pause ),
            MediaControlEvent::Toggle => Some( MediaCommand::Toggle ),
            MediaControlEvent::Stop => Some( MediaCommand::Stop ),
            MediaControlEvent::Next => Some( MediaCommand::Next ),
            MediaControlEvent::Previous => Some( MediaCommand::Previous ),
            _ => None,
        }
    }
}


/// What the overlay shows for the segment on air.
#[derive( Debug, Clone, PartialEq )]
pub struct MediaInfo {
    pub title: String,
    /// The artist, or the station for untagged segments.
    pub artist: String,
    /// The station.
    pub album: String,
    pub duration: Duration,
    pub paused: bool,
}


impl MediaInfo {
    pub fn from_now_playing( now: &NowPlaying ) -> Self {
        let segment = &now.segment;
        Self {
            title: segment.title.clone(),
            artist: segment.artist.clone().unwrap_or_else( || now.station.clone() ),
            album: now.station.clone(),
            duration: segment.duration,
            paused: now.paused,
        }
    }
}


/// Wrapper around souvlaki MediaControls.
pub struct MediaControlsHandler {
    controls: MediaControls,
    published: Option<MediaInfo>,
    _window: platform::Window,
}


impl MediaControlsHandler {
    /// Creates the controls and forwards overlay commands to `sender`.
    ///
    /// Returns None if media controls are not available.
    pub fn new( sender: Sender<MediaCommand> ) -> Option<Self> {
        let window = platform::create_window()?;

        let config = PlatformConfig {
            dbus_name: "radioport",
            display_name: "Radioport",
            hwnd: window.handle(),
        };

        let mut controls = match MediaControls::new( config ) {
            Ok( c ) => c,
            Err( e ) => {
                tracing::warn!( "Failed to create media controls: {:?}", e );
                return None;
            }
        };

        if let Err( e ) = controls.attach( move |event: MediaControlEvent| {
            if let Some( command ) = MediaCommand::from_event( &event ) {
                let _ = sender.send( command );
            }
        }) {
            tracing::warn!( "Failed to attach media control handler: {:?}", e );
            return None;
        }

        tracing::info!( "System media controls initialized" );
        Some( Self { controls, published: None, _window: window } )
    }


    /// Pushes the on-air state when it changed since the last call.
    pub fn update( &mut self, now: Option<&NowPlaying> ) {
        let info = now.map( MediaInfo::from_now_playing );
        if info == self.published {
            return;
        }

        let playback = match ( &info, now ) {
            ( Some( info ), Some( now ) ) => {
                let metadata = MediaMetadata {
                    title: Some( &info.title ),
                    album: Some( &info.album ),
                    artist: Some( &info.artist ),
                    cover_url: None,
                    duration: Some( info.duration ),
                };
                if let Err( e ) = self.controls.set_metadata( metadata ) {
                    tracing::debug!( "Failed to set media metadata: {:?}", e );
                }

                let progress = Some( MediaPosition( now.elapsed ) );
                if info.paused {
                    MediaPlayback::Paused { progress }
                } else {
                    MediaPlayback::Playing { progress }
                }
            }
            _ => MediaPlayback::Stopped,
        };

        if let Err( e ) = self.controls.set_playback( playback ) {
            tracing::debug!( "Failed to set playback state: {:?}", e );
        }
        self.published = info;
    }
}


#[cfg( test )]
mod tests {
    use radioport_core::{ Category, Segment };

    use super::*;


    fn now_playing( segment: Segment, paused: bool ) -> NowPlaying {
        NowPlaying {
            station: "107.3 Morro Rock Radio".into(),
            elapsed: Duration::from_secs( 12 ),
            remaining: segment.duration - Duration::from_secs( 12 ),
            ratio: 0.1,
            paused,
            transitioning: false,
            upcoming: Vec::new(),
            played: 3,
            segment,
        }
    }


    #[test]
    fn test_event_mapping() {
        assert_eq!( MediaCommand::from_event( &MediaControlEvent::Toggle ), Some( MediaCommand::Toggle ) );
        assert_eq!( MediaCommand::from_event( &MediaControlEvent::Next ), Some( MediaCommand::Next ) );
        assert_eq!( MediaCommand::from_event( &MediaControlEvent::Previous ), Some( MediaCommand::Previous ) );
        assert_eq!( MediaCommand::from_event( &MediaControlEvent::Raise ), None );
    }


    #[test]
    fn test_info_for_tagged_song() {
        let song = Segment::new( "morro/song", Category::Song, Duration::from_secs( 180 ), "107.3 Morro Rock Radio", "Chippin' In" )
            .with_artist( "SAMURAI" );
        let info = MediaInfo::from_now_playing( &now_playing( song, false ) );

        assert_eq!( info.title, "Chippin' In" );
        assert_eq!( info.artist, "SAMURAI" );
        assert_eq!( info.album, "107.3 Morro Rock Radio" );
        assert_eq!( info.duration, Duration::from_secs( 180 ) );
        assert!( !info.paused );
    }


    #[test]
    fn test_info_for_dj_line_names_station() {
        let line = Segment::new( "morro/dj/1", Category::DjLine, Duration::from_secs( 20 ), "107.3 Morro Rock Radio", "DJ" );
        let info = MediaInfo::from_now_playing( &now_playing( line, true ) );
        assert_eq!( info.artist, "107.3 Morro Rock Radio" );
        assert!( info.paused );
    }
}
