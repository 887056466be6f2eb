//! Sound cues for exercises.
//!
//! Sounds are an external capability: something that can start playing a
//! named resource and return straight away, and stop whatever is playing.
//! Backends are looked up per platform in an explicit [`SounderRegistry`]
//! built once at startup.

use crate::config::{SoundBackend, SoundConfig};
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::process::{Child, Command, Stdio};
use std::sync::Mutex;

/// Something that can play one sound at a time
pub trait Sounder {
    /// Short backend name for logs
    fn name(&self) -> &str;

    /// Start playing `resource` and return immediately, stopping any
    /// sound already playing
    fn play(&self, resource: &str) -> Result<()>;

    /// Stop the current sound, if any
    fn stop(&self);
}

/// The resources played at each point of an exercise
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CueSounds {
    /// Played when the read delay ends and the exercise begins
    pub start: String,
    /// Played on each of the final ticks of the active phase
    pub countdown: String,
    /// Played when the active phase ends
    pub finish: String,
}

impl From<&SoundConfig> for CueSounds {
    fn from(config: &SoundConfig) -> Self {
        Self {
            start: config.start_cue.clone(),
            countdown: config.countdown_cue.clone(),
            finish: config.finish_cue.clone(),
        }
    }
}

impl Default for CueSounds {
    fn default() -> Self {
        Self::from(&SoundConfig::default())
    }
}

// ============================================================================
// Backends
// ============================================================================

/// Makes no sound at all
#[derive(Clone, Copy, Debug, Default)]
pub struct QuietSounder;

impl Sounder for QuietSounder {
    fn name(&self) -> &str {
        "quiet"
    }

    fn play(&self, _resource: &str) -> Result<()> {
        Ok(())
    }

    fn stop(&self) {}
}

/// Plays sounds by spawning an external player process per cue
#[derive(Debug)]
pub struct CommandSounder {
    command: Vec<String>,
    current: Mutex<Option<Child>>,
}

impl CommandSounder {
    /// `command` is the player program followed by any leading arguments;
    /// the resource is appended as the final argument
    pub fn new(command: Vec<String>) -> Result<Self> {
        if command.is_empty() {
            return Err(Error::Config("sound player command is empty".into()));
        }
        Ok(Self {
            command,
            current: Mutex::new(None),
        })
    }
}

impl Sounder for CommandSounder {
    fn name(&self) -> &str {
        "command"
    }

    fn play(&self, resource: &str) -> Result<()> {
        self.stop();

        let child = Command::new(&self.command[0])
            .args(&self.command[1..])
            .arg(resource)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        tracing::debug!("Playing {} with {}", resource, self.command[0]);

        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current = Some(child);
        Ok(())
    }

    fn stop(&self) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(mut child) = current.take() {
            // The player may already have exited on its own
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

impl Drop for CommandSounder {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(feature = "rodio")]
pub use self::rodio_backend::RodioSounder;

#[cfg(feature = "rodio")]
mod rodio_backend {
    use super::Sounder;
    use crate::{Error, Result};
    use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
    use std::fs::File;
    use std::io::BufReader;
    use std::sync::Mutex;

    /// Plays sounds in-process through the default audio output
    pub struct RodioSounder {
        // Keep the stream alive - dropping it stops all audio
        _stream: OutputStream,
        handle: OutputStreamHandle,
        sink: Mutex<Option<Sink>>,
    }

    impl RodioSounder {
        pub fn new() -> Result<Self> {
            let (stream, handle) = OutputStream::try_default()
                .map_err(|e| Error::Config(format!("Failed to open audio output stream: {}", e)))?;
            Ok(Self {
                _stream: stream,
                handle,
                sink: Mutex::new(None),
            })
        }
    }

    impl Sounder for RodioSounder {
        fn name(&self) -> &str {
            "rodio"
        }

        fn play(&self, resource: &str) -> Result<()> {
            self.stop();

            let file = File::open(resource)?;
            let source = Decoder::new(BufReader::new(file)).map_err(|e| {
                Error::Parse(format!("Failed to decode sound file {}: {}", resource, e))
            })?;
            let sink = Sink::try_new(&self.handle)
                .map_err(|e| Error::Config(format!("Failed to create audio sink: {}", e)))?;
            sink.append(source);

            let mut current = self.sink.lock().unwrap_or_else(|e| e.into_inner());
            *current = Some(sink);
            Ok(())
        }

        fn stop(&self) {
            let mut current = self.sink.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(sink) = current.take() {
                sink.stop();
            }
        }
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Builds a sounder from the sound configuration
pub type SounderConstructor = fn(&SoundConfig) -> Result<Box<dyn Sounder>>;

/// Platform key → sounder constructor
#[derive(Clone, Default)]
pub struct SounderRegistry {
    constructors: BTreeMap<String, SounderConstructor>,
}

impl fmt::Debug for SounderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.constructors.keys()).finish()
    }
}

fn command_sounder(config: &SoundConfig) -> Result<Box<dyn Sounder>> {
    Ok(Box::new(CommandSounder::new(config.player.clone())?))
}

#[cfg(feature = "rodio")]
fn rodio_sounder(_config: &SoundConfig) -> Result<Box<dyn Sounder>> {
    Ok(Box::new(RodioSounder::new()?))
}

impl SounderRegistry {
    /// An empty registry; every lookup falls back to [`QuietSounder`]
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry with the built-in platform backends
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.constructors.insert("unix".into(), command_sounder);
        #[cfg(feature = "rodio")]
        {
            registry.constructors.insert("unix".into(), rodio_sounder);
            registry.constructors.insert("windows".into(), rodio_sounder);
        }
        registry
    }

    /// The key used for the running platform
    pub fn current_platform() -> &'static str {
        std::env::consts::FAMILY
    }

    /// Register (or replace) the backend for `platform`
    pub fn register(&mut self, platform: &str, constructor: SounderConstructor) -> Result<()> {
        if platform.trim().is_empty() {
            return Err(Error::Protocol(
                "To register a sound backend you must name the platform it serves".into(),
            ));
        }
        self.constructors.insert(platform.to_string(), constructor);
        Ok(())
    }

    pub fn platforms(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    /// Build the backend registered for `platform`, or a quiet one
    pub fn sounder_for(&self, platform: &str, config: &SoundConfig) -> Box<dyn Sounder> {
        let Some(constructor) = self.constructors.get(platform) else {
            tracing::warn!("Sorry, sounds on platform '{}' are not supported", platform);
            return Box::new(QuietSounder);
        };

        match constructor(config) {
            Ok(sounder) => {
                tracing::info!("Using {} sound backend", sounder.name());
                sounder
            }
            Err(e) => {
                tracing::warn!("Sound backend for '{}' unavailable: {}", platform, e);
                Box::new(QuietSounder)
            }
        }
    }

    /// Build the sounder the configuration asks for on this platform
    pub fn sounder(&self, config: &SoundConfig) -> Box<dyn Sounder> {
        if !config.enabled || config.backend == SoundBackend::Quiet {
            return Box::new(QuietSounder);
        }
        self.sounder_for(Self::current_platform(), config)
    }
}
