//! Low-level FFI bindings to OpenAL Soft, built from source.
//!
//! This crate builds OpenAL Soft 1.25.1 from source via CMake and exposes
//! the subset of the C API used for streamed source playback: device and
//! context setup, sources, buffers and the buffer queue.

#![allow(non_camel_case_types, non_upper_case_globals)]

use std::ffi::c_void;

// ============================================================================
// Types
// ============================================================================

pub type ALboolean = i8;
pub type ALint = i32;
pub type ALuint = u32;
pub type ALfloat = f32;
pub type ALenum = i32;
pub type ALsizei = i32;

/// Opaque device handle.
pub enum ALCdevice {}
/// Opaque context handle.
pub enum ALCcontext {}

pub type ALCboolean = i8;
pub type ALCchar = i8;
pub type ALCint = i32;
pub type ALCenum = i32;

// ============================================================================
// AL constants
// ============================================================================

pub const AL_FALSE: ALboolean = 0;
pub const AL_TRUE: ALboolean = 1;
pub const AL_NO_ERROR: ALenum = 0;

// Source properties
pub const AL_PITCH: ALenum = 0x1003;
pub const AL_POSITION: ALenum = 0x1004;
pub const AL_LOOPING: ALenum = 0x1007;
pub const AL_BUFFER: ALenum = 0x1009;
pub const AL_GAIN: ALenum = 0x100A;
pub const AL_SOURCE_STATE: ALenum = 0x1010;
pub const AL_PLAYING: ALenum = 0x1012;
pub const AL_PAUSED: ALenum = 0x1013;
pub const AL_STOPPED: ALenum = 0x1014;
pub const AL_BUFFERS_QUEUED: ALenum = 0x1015;
pub const AL_BUFFERS_PROCESSED: ALenum = 0x1016;
pub const AL_SOURCE_RELATIVE: ALenum = 0x0202;
pub const AL_BYTE_OFFSET: ALenum = 0x1026;

// Buffer formats
pub const AL_FORMAT_MONO16: ALenum = 0x1101;

// ============================================================================
// ALC constants
// ============================================================================

pub const ALC_FREQUENCY: ALCenum = 0x1007;
pub const ALC_DEVICE_SPECIFIER: ALCenum = 0x1005;

extern "C" {
    // ========================================================================
    // Core AL functions
    // ========================================================================

    pub fn alGetError() -> ALenum;

    // Sources
    pub fn alGenSources(n: ALsizei, sources: *mut ALuint);
    pub fn alDeleteSources(n: ALsizei, sources: *const ALuint);
    pub fn alSourcei(source: ALuint, param: ALenum, value: ALint);
    pub fn alSourcef(source: ALuint, param: ALenum, value: ALfloat);
    pub fn alSource3f(
        source: ALuint,
        param: ALenum,
        v1: ALfloat,
        v2: ALfloat,
        v3: ALfloat,
    );
    pub fn alGetSourcei(source: ALuint, param: ALenum, value: *mut ALint);
    pub fn alSourcePlay(source: ALuint);
    pub fn alSourceStop(source: ALuint);
    pub fn alSourcePause(source: ALuint);

    // Buffers
    pub fn alGenBuffers(n: ALsizei, buffers: *mut ALuint);
    pub fn alDeleteBuffers(n: ALsizei, buffers: *const ALuint);
    pub fn alIsBuffer(buffer: ALuint) -> ALboolean;
    pub fn alBufferData(
        buffer: ALuint,
        format: ALenum,
        data: *const c_void,
        size: ALsizei,
        freq: ALsizei,
    );

    // Buffer queue (for streaming audio)
    pub fn alSourceQueueBuffers(source: ALuint, n: ALsizei, buffers: *const ALuint);
    pub fn alSourceUnqueueBuffers(source: ALuint, n: ALsizei, buffers: *mut ALuint);

    // ========================================================================
    // ALC (context/device) functions
    // ========================================================================

    pub fn alcOpenDevice(devicename: *const ALCchar) -> *mut ALCdevice;
    pub fn alcCloseDevice(device: *mut ALCdevice) -> ALCboolean;
    pub fn alcCreateContext(
        device: *mut ALCdevice,
        attrlist: *const ALCint,
    ) -> *mut ALCcontext;
    pub fn alcDestroyContext(context: *mut ALCcontext);
    pub fn alcMakeContextCurrent(context: *mut ALCcontext) -> ALCboolean;
    pub fn alcGetString(device: *mut ALCdevice, param: ALCenum) -> *const ALCchar;
}
