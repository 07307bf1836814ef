pub mod http;
pub mod wav;

pub use http::build_http_client;
pub use wav::{WavError, pcm_to_wav, write_audio_file};
