pub mod backend;
pub mod decode;
pub mod file;
pub mod output;
pub mod player;
pub mod recorder;
pub mod wav;

#[cfg(feature = "backend-cpal")]
pub mod device;

pub use backend::{AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioFrame, AudioSource};
pub use decode::{decode_audio, DecodedAudio};
pub use file::{AudioFile, FileBackend};
pub use output::{AudioOutput, PacedOutput};
pub use player::{AudioPlayer, HttpAudioPlayer};
pub use recorder::{AnswerRecording, AudioRecorder, CaptureRecorder};
pub use wav::{encode_wav, AnswerBuffer};

#[cfg(feature = "backend-cpal")]
pub use device::{CpalOutput, MicrophoneBackend};
