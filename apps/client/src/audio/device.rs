use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};
use crossbeam_channel::{Receiver, TryRecvError};
use tracing::{error, info};

use super::{AudioCapture, CaptureFormat};
use crate::errors::CaptureError;

/// Default input device via `cpal`. The stream callback downmixes to mono and
/// forwards each buffer over a channel that `read_chunk` drains.
#[derive(Default)]
pub struct CpalCapture {
    stream: Option<Stream>,
    receiver: Option<Receiver<Vec<f32>>>,
}

impl CpalCapture {
    pub fn new() -> Self {
        Self::default()
    }
}

fn downmix(data: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        data.to_vec()
    } else {
        data.chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    }
}

fn stream_error(err: cpal::StreamError) {
    error!("Audio input stream error: {err}");
}

impl AudioCapture for CpalCapture {
    fn open_capture(&mut self) -> Result<CaptureFormat, CaptureError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(CaptureError::Unavailable)?;

        info!(
            "Using input device: {}",
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );

        let supported = device
            .default_input_config()
            .map_err(|e| CaptureError::Open(format!("Failed to get input config: {e}")))?;
        let sample_format = supported.sample_format();
        let config: StreamConfig = supported.into();
        let channels = config.channels as usize;

        let (tx, rx) = crossbeam_channel::unbounded();

        let stream = match sample_format {
            SampleFormat::F32 => device.build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let _ = tx.send(downmix(data, channels));
                },
                stream_error,
                None,
            ),
            SampleFormat::I16 => device.build_input_stream(
                &config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    let floats: Vec<f32> =
                        data.iter().map(|&s| s as f32 / i16::MAX as f32).collect();
                    let _ = tx.send(downmix(&floats, channels));
                },
                stream_error,
                None,
            ),
            other => {
                return Err(CaptureError::Open(format!(
                    "Unsupported sample format {other:?}"
                )))
            }
        }
        .map_err(|e| CaptureError::Open(format!("Failed to build input stream: {e}")))?;

        stream
            .play()
            .map_err(|e| CaptureError::Open(format!("Failed to start input stream: {e}")))?;

        self.stream = Some(stream);
        self.receiver = Some(rx);

        info!("Started audio capture at {} Hz", config.sample_rate.0);
        Ok(CaptureFormat {
            sample_rate: config.sample_rate.0,
        })
    }

    fn read_chunk(&mut self) -> Result<Option<Vec<f32>>, CaptureError> {
        let Some(receiver) = &self.receiver else {
            return Ok(None);
        };
        match receiver.try_recv() {
            Ok(chunk) => Ok(Some(chunk)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => {
                Err(CaptureError::Stream("input stream closed".to_string()))
            }
        }
    }

    fn close_capture(&mut self) {
        if self.stream.take().is_some() {
            info!("Stopped audio capture");
        }
        self.receiver = None;
    }
}
