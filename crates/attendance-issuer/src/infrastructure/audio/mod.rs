//! Audio output adapters implementing [`AudioOutput`].
//!
//! # What is a near-ultrasonic tone? (for beginners)
//!
//! Most adults cannot hear much above 17-18 kHz, but phone microphones
//! record up to roughly 20-22 kHz.  A quiet sine wave at 19.0-19.4 kHz is
//! therefore inaudible to the room yet detectable by every student phone in
//! it.  Attenuation through walls keeps the signal local to the classroom.
//!
//! - **`simulated`** – Renders the sine wave into sample blocks on a tokio
//!   task, exactly as a sound card callback would, but without a device.
//! - **`mock`** – Records `create_tone` / `stop` calls for assertions.
//!
//! [`AudioOutput`]: crate::application::emit_frequency::AudioOutput

pub mod mock;
pub mod simulated;

pub use mock::MockAudioOutput;
pub use simulated::{SimulatedAudioOutput, SineOscillator};
