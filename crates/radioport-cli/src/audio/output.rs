//! Audio output via cpal
//!
//! Sends decoded PCM samples to the system audio device through a shared
//! buffer that converts channel layouts and applies volume.

use std::collections::VecDeque;
use std::sync::atomic::{ AtomicBool, AtomicU32, Ordering };
use std::sync::{ Arc, Mutex, MutexGuard, PoisonError };

use cpal::traits::{ DeviceTrait, HostTrait, StreamTrait };
use thiserror::Error;


/// Errors that can occur with audio output.
#[derive( Debug, Error )]
pub enum OutputError {
    #[error( "No output device available" )]
    NoDevice,

    #[error( "Failed to get default stream config: {0}" )]
    StreamConfig( String ),

    #[error( "Failed to build output stream: {0}" )]
    BuildStream( String ),

    #[error( "Failed to play stream: {0}" )]
    PlayStream( String ),
}


/// Shared sample buffer between the decode thread and the audio callback.
pub struct SampleBuffer {
    buffer: Mutex<VecDeque<f32>>,
    capacity: usize,
    paused: AtomicBool,
    /// Volume level stored as f32 bits
    volume: AtomicU32,
    source_channels: u16,
    output_channels: u16,
}


impl SampleBuffer {
    /// Creates a buffer holding at most `capacity` source samples.
    pub fn new( capacity: usize, source_channels: u16, output_channels: u16 ) -> Self {
        Self {
            buffer: Mutex::new( VecDeque::with_capacity( capacity ) ),
            capacity,
            paused: AtomicBool::new( false ),
            volume: AtomicU32::new( 1.0_f32.to_bits() ),
            source_channels: source_channels.max( 1 ),
            output_channels: output_channels.max( 1 ),
        }
    }


    fn samples( &self ) -> MutexGuard<'_, VecDeque<f32>> {
        self.buffer.lock().unwrap_or_else( PoisonError::into_inner )
    }


    /// Pushes samples. Returns how many fit.
    pub fn push( &self, samples: &[f32] ) -> usize {
        let mut buf = self.samples();
        let available = self.capacity.saturating_sub( buf.len() );
        let to_push = samples.len().min( available );
        buf.extend( samples[ ..to_push ].iter().copied() );
        to_push
    }


    /// Fills `output` in the device's channel layout, padding with silence.
    /// Returns the number of output samples that carried audio.
    pub fn pop( &self, output: &mut [f32] ) -> usize {
        output.fill( 0.0 );
        if self.paused.load( Ordering::Relaxed ) {
            return 0;
        }

        let volume = self.volume();
        let src_ch = self.source_channels as usize;
        let out_ch = self.output_channels as usize;
        let mut buf = self.samples();

        let frames = ( output.len() / out_ch ).min( buf.len() / src_ch );
        let mut frame = Vec::with_capacity( src_ch );

        for i in 0..frames {
            frame.clear();
            frame.extend( buf.drain( ..src_ch ) );

            let out = &mut output[ i * out_ch..( i + 1 ) * out_ch ];
            if src_ch == 2 && out_ch == 1 {
                out[ 0 ] = ( frame[ 0 ] + frame[ 1 ] ) * 0.5;
            } else {
                for ( ch, sample ) in out.iter_mut().enumerate() {
                    // Extra output channels repeat the last source channel
                    *sample = frame[ ch.min( src_ch - 1 ) ];
                }
            }
        }

        let written = frames * out_ch;
        if volume != 1.0 {
            for sample in output[ ..written ].iter_mut() {
                *sample *= volume;
            }
        }
        written
    }


    pub fn len( &self ) -> usize {
        self.samples().len()
    }


    pub fn is_empty( &self ) -> bool {
        self.samples().is_empty()
    }


    pub fn clear( &self ) {
        self.samples().clear();
    }


    pub fn set_paused( &self, paused: bool ) {
        self.paused.store( paused, Ordering::Relaxed );
    }


    pub fn is_paused( &self ) -> bool {
        self.paused.load( Ordering::Relaxed )
    }


    /// Sets the volume level (0.0 = mute, 1.0 = normal, >1.0 = boost).
    pub fn set_volume( &self, volume: f32 ) {
        self.volume.store( volume.to_bits(), Ordering::Relaxed );
    }


    pub fn volume( &self ) -> f32 {
        f32::from_bits( self.volume.load( Ordering::Relaxed ) )
    }
}


/// An open output stream.
///
/// Not Send: cpal streams stay on the thread that created them.
pub struct AudioOutput {
    stream: cpal::Stream,
    sample_rate: u32,
}


impl AudioOutput {
    /// Opens the default device for a source of the given format.
    ///
    /// Returns the output and the buffer the decode thread should feed.
    pub fn new(
        source_sample_rate: u32,
        source_channels: u16,
    ) -> Result<( Self, Arc<SampleBuffer> ), OutputError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or( OutputError::NoDevice )?;

        let supported: Vec<_> = device
            .supported_output_configs()
            .map_err( |e| OutputError::StreamConfig( e.to_string() ) )?
            .collect();

        let fits_rate = |c: &&cpal::SupportedStreamConfigRange| {
            c.min_sample_rate().0 <= source_sample_rate && c.max_sample_rate().0 >= source_sample_rate
        };

        // Exact match first, then any layout at our rate, then the device default
        let config = if let Some( c ) = supported.iter().filter( fits_rate ).find( |c| c.channels() == source_channels ) {
            c.clone().with_sample_rate( cpal::SampleRate( source_sample_rate ) ).config()
        } else if let Some( c ) = supported.iter().find( fits_rate ) {
            c.clone().with_sample_rate( cpal::SampleRate( source_sample_rate ) ).config()
        } else {
            let default_config = device
                .default_output_config()
                .map_err( |e| OutputError::StreamConfig( e.to_string() ) )?;
            tracing::debug!(
                "Device does not take {} Hz, resampling to {} Hz",
                source_sample_rate,
                default_config.sample_rate().0
            );
            default_config.config()
        };

        // About half a second of audio
        let capacity = ( config.sample_rate.0 as usize ) * ( source_channels as usize ) / 2;
        let sample_buffer = Arc::new( SampleBuffer::new( capacity, source_channels, config.channels ) );
        let callback_buffer = Arc::clone( &sample_buffer );

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    callback_buffer.pop( data );
                },
                |err| {
                    tracing::error!( "Audio output error: {}", err );
                },
                None,
            )
            .map_err( |e| OutputError::BuildStream( e.to_string() ) )?;

        Ok(( Self { stream, sample_rate: config.sample_rate.0 }, sample_buffer ))
    }


    /// Starts the stream.
    pub fn play( &self ) -> Result<(), OutputError> {
        self.stream
            .play()
            .map_err( |e| OutputError::PlayStream( e.to_string() ) )
    }


    /// Rate the device actually runs at.
    pub fn sample_rate( &self ) -> u32 {
        self.sample_rate
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_push_respects_capacity() {
        let buffer = SampleBuffer::new( 4, 2, 2 );
        assert_eq!( buffer.push( &[ 0.1; 6 ] ), 4 );
        assert_eq!( buffer.len(), 4 );
        assert_eq!( buffer.push( &[ 0.1 ] ), 0 );
    }


    #[test]
    fn test_mono_to_stereo() {
        let buffer = SampleBuffer::new( 16, 1, 2 );
        buffer.push( &[ 0.5, -0.5 ] );
        let mut out = [ 9.0; 6 ];
        assert_eq!( buffer.pop( &mut out ), 4 );
        assert_eq!( out, [ 0.5, 0.5, -0.5, -0.5, 0.0, 0.0 ] );
    }


    #[test]
    fn test_stereo_to_mono() {
        let buffer = SampleBuffer::new( 16, 2, 1 );
        buffer.push( &[ 1.0, 0.0, 0.5, 0.5 ] );
        let mut out = [ 0.0; 2 ];
        buffer.pop( &mut out );
        assert_eq!( out, [ 0.5, 0.5 ] );
    }


    #[test]
    fn test_paused_outputs_silence() {
        let buffer = SampleBuffer::new( 16, 2, 2 );
        buffer.push( &[ 0.3; 4 ] );
        buffer.set_paused( true );
        let mut out = [ 1.0; 4 ];
        assert_eq!( buffer.pop( &mut out ), 0 );
        assert_eq!( out, [ 0.0; 4 ] );
        assert_eq!( buffer.len(), 4 );
    }


    #[test]
    fn test_volume_scales_and_mutes() {
        let buffer = SampleBuffer::new( 16, 1, 1 );
        buffer.set_volume( 0.5 );
        buffer.push( &[ 0.8 ] );
        let mut out = [ 0.0; 1 ];
        buffer.pop( &mut out );
        assert!( ( out[ 0 ] - 0.4 ).abs() < 1e-6 );

        buffer.set_volume( 0.0 );
        buffer.push( &[ 0.8 ] );
        buffer.pop( &mut out );
        assert_eq!( out[ 0 ], 0.0 );
    }
}
