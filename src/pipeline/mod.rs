//! Pipeline stages from uploaded scan to exported document.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested without the others and swapped without touching them.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ encode ──▶ llm ──▶ transcribe ──▶ render / docx
//! (bytes)   (base64)   (VLM)   (blocks)       (text / .docx)
//! ```
//!
//! 1. [`input`]       — validate PNG/JPEG bytes, read dimensions, fingerprint
//! 2. [`encode`]      — base64-wrap the bytes as an inline request part
//! 3. [`llm`]         — build the `generateContent` body and make the one
//!    network call; the only stage with I/O
//! 4. [`transcribe`]  — line-oriented text → heading / bullet / paragraph
//! 5. [`render`], [`docx`] — blocks + image → terminal text or Word package
//!
//! [`postprocess`] sits beside the flow: an opt-in cleanup of the reply
//! (outer fence, invisible characters) applied only when
//! `sanitize_response` is set.

pub mod docx;
pub mod encode;
pub mod input;
pub mod llm;
pub mod postprocess;
pub mod render;
pub mod transcribe;
