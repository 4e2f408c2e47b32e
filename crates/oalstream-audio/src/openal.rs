//! OpenAL Soft implementation of the stream backend.
//!
//! OpenAL Soft is built from source via the `openal-soft-sys` crate. The
//! device owns the context; sources and buffers are generated on it and
//! handed to `StreamPlayer` as plain ids.

use std::ffi::{c_void, CStr};
use std::ptr;

use oalstream_common::math::Vec3;
use openal_soft_sys as al;
use tracing::{error, info};

use crate::backend::{BufferId, SourceId, SourceState, StreamBackend};
use crate::error::BackendError;

/// Default output rate requested from the device.
const DEVICE_FREQUENCY: al::ALCint = 44100;

pub struct OpenAlDevice {
    device: *mut al::ALCdevice,
    context: *mut al::ALCcontext,
    sources: Vec<al::ALuint>,
    buffers: Vec<al::ALuint>,
}

fn check_error() -> Result<(), BackendError> {
    // SAFETY: a context is current whenever an OpenAlDevice exists.
    let err = unsafe { al::alGetError() };
    if err != al::AL_NO_ERROR {
        return Err(BackendError::Al(err));
    }
    Ok(())
}

impl OpenAlDevice {
    /// Open the default device and make a fresh context current.
    pub fn open() -> Result<Self, BackendError> {
        // SAFETY: OpenAL Soft is statically linked; a null name selects the
        // default device and the attribute list is zero-terminated.
        unsafe {
            let device = al::alcOpenDevice(ptr::null());
            if device.is_null() {
                error!("OpenAL: failed to open default audio device");
                return Err(BackendError::NoDevice);
            }

            let attrs: [al::ALCint; 3] = [al::ALC_FREQUENCY, DEVICE_FREQUENCY, 0];
            let context = al::alcCreateContext(device, attrs.as_ptr());
            if context.is_null() {
                error!("OpenAL: failed to create context");
                al::alcCloseDevice(device);
                return Err(BackendError::NoContext);
            }
            al::alcMakeContextCurrent(context);

            let name = al::alcGetString(device, al::ALC_DEVICE_SPECIFIER);
            if !name.is_null() {
                info!("OpenAL: opened {}", CStr::from_ptr(name).to_string_lossy());
            }

            Ok(Self {
                device,
                context,
                sources: Vec::new(),
                buffers: Vec::new(),
            })
        }
    }

    /// Generate listener-relative sources; a stream takes two.
    pub fn gen_sources(&mut self, count: usize) -> Result<Vec<SourceId>, BackendError> {
        let mut ids = vec![0 as al::ALuint; count];
        // SAFETY: `ids` holds exactly `count` slots.
        unsafe {
            al::alGenSources(count as al::ALsizei, ids.as_mut_ptr());
            check_error()?;
            for &source in &ids {
                al::alSourcei(source, al::AL_SOURCE_RELATIVE, al::AL_TRUE as al::ALint);
                al::alSource3f(source, al::AL_POSITION, 0.0, 0.0, 0.0);
                al::alSourcef(source, al::AL_GAIN, 1.0);
                al::alSourcei(source, al::AL_LOOPING, al::AL_FALSE as al::ALint);
            }
        }
        self.sources.extend_from_slice(&ids);
        Ok(ids.into_iter().map(SourceId).collect())
    }

    pub fn gen_buffers(&mut self, count: usize) -> Result<Vec<BufferId>, BackendError> {
        let mut ids = vec![0 as al::ALuint; count];
        // SAFETY: `ids` holds exactly `count` slots.
        unsafe {
            al::alGenBuffers(count as al::ALsizei, ids.as_mut_ptr());
        }
        check_error()?;
        self.buffers.extend_from_slice(&ids);
        Ok(ids.into_iter().map(BufferId).collect())
    }

    pub fn close(&mut self) {
        if self.device.is_null() {
            return;
        }

        // SAFETY: every id was generated on this context, which is still current.
        unsafe {
            for &source in &self.sources {
                al::alSourceStop(source);
                al::alSourcei(source, al::AL_BUFFER, 0);
            }
            if !self.sources.is_empty() {
                al::alDeleteSources(self.sources.len() as al::ALsizei, self.sources.as_ptr());
            }
            if !self.buffers.is_empty() {
                al::alDeleteBuffers(self.buffers.len() as al::ALsizei, self.buffers.as_ptr());
            }

            al::alcMakeContextCurrent(ptr::null_mut());
            al::alcDestroyContext(self.context);
            al::alcCloseDevice(self.device);
        }

        self.sources.clear();
        self.buffers.clear();
        self.context = ptr::null_mut();
        self.device = ptr::null_mut();
        info!("OpenAL: shut down");
    }
}

impl Drop for OpenAlDevice {
    fn drop(&mut self) {
        self.close();
    }
}

fn get_source_i(source: SourceId, param: al::ALenum) -> al::ALint {
    let mut value: al::ALint = 0;
    // SAFETY: `value` is a valid out pointer; unknown sources leave it untouched.
    unsafe {
        al::alGetSourcei(source.0, param, &mut value);
    }
    value
}

impl StreamBackend for OpenAlDevice {
    fn is_buffer(&self, buffer: BufferId) -> bool {
        // SAFETY: plain query on the current context.
        !buffer.is_none() && unsafe { al::alIsBuffer(buffer.0) } == al::AL_TRUE
    }

    fn source_state(&self, source: SourceId) -> SourceState {
        match get_source_i(source, al::AL_SOURCE_STATE) {
            al::AL_PLAYING => SourceState::Playing,
            al::AL_PAUSED => SourceState::Paused,
            al::AL_STOPPED => SourceState::Stopped,
            _ => SourceState::Initial,
        }
    }

    fn buffers_queued(&self, source: SourceId) -> usize {
        get_source_i(source, al::AL_BUFFERS_QUEUED).max(0) as usize
    }

    fn buffers_processed(&self, source: SourceId) -> usize {
        get_source_i(source, al::AL_BUFFERS_PROCESSED).max(0) as usize
    }

    fn byte_offset(&self, source: SourceId) -> usize {
        get_source_i(source, al::AL_BYTE_OFFSET).max(0) as usize
    }

    fn buffer_data(&mut self, buffer: BufferId, pcm: &[i16], sample_rate: u32) {
        // SAFETY: the pointer and byte length describe `pcm`, which OpenAL copies.
        unsafe {
            al::alBufferData(
                buffer.0,
                al::AL_FORMAT_MONO16,
                pcm.as_ptr() as *const c_void,
                std::mem::size_of_val(pcm) as al::ALsizei,
                sample_rate as al::ALsizei,
            );
        }
        if let Err(e) = check_error() {
            error!("OpenAL: buffer upload failed: {}", e);
        }
    }

    fn queue_buffer(&mut self, source: SourceId, buffer: BufferId) {
        // SAFETY: one id read from a valid pointer.
        unsafe {
            al::alSourceQueueBuffers(source.0, 1, &buffer.0);
        }
    }

    fn unqueue_buffer(&mut self, source: SourceId) -> Option<BufferId> {
        let mut buffer: al::ALuint = 0;
        // SAFETY: one id written to a valid pointer.
        unsafe {
            al::alSourceUnqueueBuffers(source.0, 1, &mut buffer);
        }
        check_error().ok()?;
        Some(BufferId(buffer))
    }

    fn play(&mut self, source: SourceId) {
        // SAFETY: plain call on the current context.
        unsafe { al::alSourcePlay(source.0) }
    }

    fn stop(&mut self, source: SourceId) {
        // SAFETY: plain call on the current context.
        unsafe { al::alSourceStop(source.0) }
    }

    fn pause(&mut self, source: SourceId) {
        // SAFETY: plain call on the current context.
        unsafe { al::alSourcePause(source.0) }
    }

    fn set_gain(&mut self, source: SourceId, gain: f32) {
        // SAFETY: plain call on the current context.
        unsafe { al::alSourcef(source.0, al::AL_GAIN, gain) }
    }

    fn set_pitch(&mut self, source: SourceId, pitch: f32) {
        // SAFETY: plain call on the current context.
        unsafe { al::alSourcef(source.0, al::AL_PITCH, pitch) }
    }

    fn set_position(&mut self, source: SourceId, position: Vec3) {
        // SAFETY: plain call on the current context.
        unsafe { al::alSource3f(source.0, al::AL_POSITION, position[0], position[1], position[2]) }
    }

    fn set_looping(&mut self, source: SourceId, looping: bool) {
        let value = if looping { al::AL_TRUE } else { al::AL_FALSE };
        // SAFETY: plain call on the current context.
        unsafe { al::alSourcei(source.0, al::AL_LOOPING, value as al::ALint) }
    }
}

// SAFETY: the device and context pointers are only touched through &mut self
// and OpenAL Soft calls are thread-safe.
unsafe impl Send for OpenAlDevice {}
