//! Audio decoding via Symphonia
//!
//! Opens segment files, reads their duration and tags for the catalog, and
//! decodes them into interleaved f32 samples for playback.

use std::fs::File;
use std::path::Path;
use std::time::Duration;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{ Decoder as SymphoniaDecoder, DecoderOptions, CODEC_TYPE_NULL };
use symphonia::core::formats::{ FormatOptions, FormatReader, SeekMode, SeekTo };
use symphonia::core::io::{ MediaSourceStream, MediaSourceStreamOptions };
use symphonia::core::meta::{ MetadataOptions, StandardTagKey, Tag };
use symphonia::core::probe::{ Hint, ProbedMetadata };
use symphonia::core::units::Time;
use thiserror::Error;


/// Errors that can occur during decoding.
#[derive( Debug, Error )]
pub enum DecoderError {
    #[error( "Failed to open file: {0}" )]
    FileOpen( #[from] std::io::Error ),

    #[error( "Unsupported format" )]
    UnsupportedFormat,

    #[error( "No audio tracks found" )]
    NoAudioTrack,

    #[error( "Decoder creation failed: {0}" )]
    DecoderCreation( String ),

    #[error( "Decode error: {0}" )]
    Decode( String ),

    #[error( "Seek error: {0}" )]
    Seek( String ),
}


/// What the catalog needs to know about a file.
#[derive( Debug, Clone, Default, PartialEq )]
pub struct FileInfo {
    pub duration: Option<Duration>,
    pub title: Option<String>,
    pub artist: Option<String>,
}


/// Audio decoder wrapper around Symphonia.
pub struct Decoder {
    format_reader: Box<dyn FormatReader>,
    decoder: Box<dyn SymphoniaDecoder>,
    track_id: u32,
    sample_rate: u32,
    channels: usize,
    sample_buf: Option<SampleBuffer<f32>>,
    duration: Option<Duration>,
    /// Metadata found while opening the file (ID3 tags, etc.)
    format_metadata: ProbedMetadata,
}


impl Decoder {
    /// Opens an audio file for decoding.
    pub fn open( path: &Path ) -> Result<Self, DecoderError> {
        let file = File::open( path )?;
        let mss = MediaSourceStream::new( Box::new( file ), MediaSourceStreamOptions::default() );

        let mut hint = Hint::new();
        if let Some( ext ) = path.extension().and_then( |e| e.to_str() ) {
            hint.with_extension( ext );
        }

        let opened = symphonia::default::get_probe()
            .format( &hint, mss, &FormatOptions::default(), &MetadataOptions::default() )
            .map_err( |_| DecoderError::UnsupportedFormat )?;

        let format_metadata = opened.metadata;
        let format_reader = opened.format;

        let track = format_reader
            .tracks()
            .iter()
            .find( |t| t.codec_params.codec != CODEC_TYPE_NULL )
            .ok_or( DecoderError::NoAudioTrack )?;

        let track_id = track.id;
        let codec_params = &track.codec_params;

        let sample_rate = codec_params.sample_rate.unwrap_or( 44100 );
        let channels = codec_params.channels.map( |c| c.count() ).unwrap_or( 2 );
        let duration = codec_params.n_frames.map( |frames| {
            Duration::from_secs_f64( frames as f64 / sample_rate as f64 )
        });

        tracing::debug!(
            "Opened {:?}: {} Hz, {} channels, duration: {:?}",
            path,
            sample_rate,
            channels,
            duration
        );

        let decoder = symphonia::default::get_codecs()
            .make( codec_params, &DecoderOptions::default() )
            .map_err( |e| DecoderError::DecoderCreation( e.to_string() ) )?;

        Ok( Self {
            format_reader,
            decoder,
            track_id,
            sample_rate,
            channels,
            sample_buf: None,
            duration,
            format_metadata,
        })
    }


    /// Reads duration and tags without decoding audio.
    ///
    /// When the container does not state a frame count the packets are walked
    /// and their durations summed.
    pub fn inspect( path: &Path ) -> Result<FileInfo, DecoderError> {
        let mut decoder = Self::open( path )?;
        let ( title, artist ) = decoder.tags();

        let duration = match decoder.duration {
            Some( d ) => Some( d ),
            None => decoder.count_duration(),
        };

        Ok( FileInfo { duration, title, artist } )
    }


    /// Returns the sample rate of the audio.
    pub fn sample_rate( &self ) -> u32 {
        self.sample_rate
    }


    /// Returns the number of channels.
    pub fn channels( &self ) -> usize {
        self.channels
    }


    /// Title and artist tags, if present.
    fn tags( &mut self ) -> ( Option<String>, Option<String> ) {
        let mut title = None;
        let mut artist = None;

        let mut extract = |tags: &[Tag]| {
            for tag in tags {
                match tag.std_key {
                    Some( StandardTagKey::TrackTitle ) if title.is_none() => title = Some( tag.value.to_string() ),
                    Some( StandardTagKey::Artist ) if artist.is_none() => artist = Some( tag.value.to_string() ),
                    _ => {}
                }
            }
        };

        // Format metadata first (ID3), then whatever the container carries
        if let Some( log ) = self.format_metadata.get() {
            if let Some( rev ) = log.current() {
                extract( rev.tags() );
            }
        }
        if let Some( rev ) = self.format_reader.metadata().current() {
            extract( rev.tags() );
        }

        ( title, artist )
    }


    fn count_duration( &mut self ) -> Option<Duration> {
        let time_base = self.format_reader
            .tracks()
            .iter()
            .find( |t| t.id == self.track_id )?
            .codec_params
            .time_base?;

        let mut ticks = 0u64;
        while let Ok( packet ) = self.format_reader.next_packet() {
            if packet.track_id() == self.track_id {
                ticks += packet.dur;
            }
        }

        let time = time_base.calc_time( ticks );
        Some( Duration::from_secs( time.seconds ) + Duration::from_secs_f64( time.frac ) )
    }


    /// Decodes the next packet and returns interleaved f32 samples.
    ///
    /// Returns None when EOF is reached.
    pub fn decode_next( &mut self ) -> Result<Option<Vec<f32>>, DecoderError> {
        loop {
            let packet = match self.format_reader.next_packet() {
                Ok( packet ) => packet,
                Err( symphonia::core::errors::Error::IoError( ref e ) )
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok( None );
                }
                Err( e ) => {
                    return Err( DecoderError::Decode( e.to_string() ) );
                }
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode( &packet ) {
                Ok( decoded ) => decoded,
                // Corrupt packets are skipped
                Err( symphonia::core::errors::Error::DecodeError( _ ) ) => continue,
                Err( e ) => {
                    return Err( DecoderError::Decode( e.to_string() ) );
                }
            };

            let spec = *decoded.spec();
            let num_frames = decoded.frames();

            let too_small = self.sample_buf
                .as_ref()
                .map( |b| b.capacity() < num_frames )
                .unwrap_or( true );
            if too_small {
                self.sample_buf = Some( SampleBuffer::new( num_frames as u64, spec ) );
            }

            let Some( sample_buf ) = self.sample_buf.as_mut() else {
                continue;
            };
            sample_buf.copy_interleaved_ref( decoded );

            return Ok( Some( sample_buf.samples().to_vec() ) );
        }
    }


    /// Seeks to a position inside the file.
    pub fn seek( &mut self, position: Duration ) -> Result<(), DecoderError> {
        let seek_to = SeekTo::Time {
            time: Time::from( position.as_secs_f64() ),
            track_id: Some( self.track_id ),
        };

        self.format_reader
            .seek( SeekMode::Accurate, seek_to )
            .map_err( |e| DecoderError::Seek( e.to_string() ) )?;

        // Reset decoder state after seek
        self.decoder.reset();

        Ok(())
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = Decoder::open( &dir.path().join( "nope.mp3" ) );
        assert!( matches!( result, Err( DecoderError::FileOpen( _ ) ) ) );
    }


    #[test]
    fn test_garbage_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join( "noise.mp3" );
        std::fs::write( &path, b"definitely not audio" ).unwrap();
        assert!( Decoder::inspect( &path ).is_err() );
    }
}
