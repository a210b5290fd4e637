//! The callback registry: a mapping from attribute tags to ordered
//! lists of element callbacks, plus a default slot for everything else.
//!
//! Callbacks are plain functions over a consumer state type `T`; the
//! state itself is passed in at dispatch time. This keeps the registry
//! free of borrowed data and lets a single consumer register any number
//! of callbacks over its own fields.

use byteordered::Endianness;
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;
use voldex_core::{Tag, VR};
use voldex_encoding::decode::primitive;

/// The information handed to a callback for one fully read element.
///
/// The value bytes are only valid for the duration of the call; a
/// callback must decode what it needs and not retain the reference.
#[derive(Debug, Copy, Clone)]
pub struct ElementContext<'a> {
    /// the element's attribute tag
    pub tag: Tag,
    /// the element's value representation; for elements read with an
    /// unknown VR, the representation the callback was registered with
    pub vr: VR,
    /// the raw value bytes
    pub bytes: &'a [u8],
    /// the length declared by the element header; usually the byte
    /// count of `bytes`, but some writers declare 0xFFFF for pixel
    /// data whose real extent follows from the image dimensions
    pub len: u32,
    /// the byte order in effect when the value bytes were read
    pub endianness: Endianness,
    /// the name of the file being parsed
    pub filename: &'a str,
    /// whether the value holds encapsulated (compressed) fragments
    pub encapsulated: bool,
}

/// The result type of element callbacks. An error is downgraded to a
/// warning by the dispatch loop and parsing continues.
pub type CallbackResult = Result<(), primitive::Error>;

/// An element callback over the consumer state type `T`.
pub type ElementCallback<T> = Box<dyn Fn(&mut T, &ElementContext<'_>) -> CallbackResult>;

/// A callback invoked at the start of each file parse, before any
/// element is dispatched, with the file name.
pub type FileStartCallback<T> = Box<dyn Fn(&mut T, &str)>;

struct CallbackEntry<T> {
    expected_vr: VR,
    callback: ElementCallback<T>,
}

/// A registry of element callbacks keyed by attribute tag.
pub struct CallbackRegistry<T> {
    callbacks: BTreeMap<Tag, Vec<CallbackEntry<T>>>,
    default: Option<ElementCallback<T>>,
    file_start: Option<FileStartCallback<T>>,
}

impl<T> fmt::Debug for CallbackRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("tags", &self.callbacks.keys().collect::<Vec<_>>())
            .field("has_default", &self.default.is_some())
            .finish()
    }
}

impl<T> Default for CallbackRegistry<T> {
    fn default() -> Self {
        CallbackRegistry {
            callbacks: BTreeMap::new(),
            default: None,
            file_start: None,
        }
    }
}

impl<T> CallbackRegistry<T> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a callback to the list for the given tag. Callbacks are
    /// delivered in registration order. `expected_vr` is the
    /// representation assumed when the element itself was read with an
    /// unknown one.
    pub fn register<G, F>(&mut self, tag: G, expected_vr: VR, callback: F)
    where
        G: Into<Tag>,
        F: Fn(&mut T, &ElementContext<'_>) -> CallbackResult + 'static,
    {
        self.callbacks
            .entry(tag.into())
            .or_default()
            .push(CallbackEntry {
                expected_vr,
                callback: Box::new(callback),
            });
    }

    /// Install the default callback, invoked for every element whose
    /// tag has no registered callback.
    pub fn register_default<F>(&mut self, callback: F)
    where
        F: Fn(&mut T, &ElementContext<'_>) -> CallbackResult + 'static,
    {
        self.default = Some(Box::new(callback));
    }

    /// Install the file-start callback, invoked once per parsed file
    /// before any element is dispatched.
    pub fn register_file_start<F>(&mut self, callback: F)
    where
        F: Fn(&mut T, &str) + 'static,
    {
        self.file_start = Some(Box::new(callback));
    }

    /// Whether any callback is registered for the given tag.
    pub fn is_registered(&self, tag: Tag) -> bool {
        self.callbacks.contains_key(&tag)
    }

    pub(crate) fn notify_file_start(&self, state: &mut T, filename: &str) {
        if let Some(callback) = &self.file_start {
            callback(state, filename);
        }
    }

    /// Deliver one element to every callback registered for its tag,
    /// or to the default callback when none is. Callback errors are
    /// downgraded to warnings so that parsing continues.
    pub fn dispatch(&self, state: &mut T, ctx: &ElementContext<'_>) {
        match self.callbacks.get(&ctx.tag) {
            Some(entries) if !entries.is_empty() => {
                for entry in entries {
                    let effective = ElementContext {
                        vr: if ctx.vr == VR::UN {
                            entry.expected_vr
                        } else {
                            ctx.vr
                        },
                        ..*ctx
                    };
                    if let Err(e) = (entry.callback)(state, &effective) {
                        warn!(
                            "{}: discarding malformed value of {}: {}",
                            ctx.filename, ctx.tag, e
                        );
                    }
                }
            }
            _ => {
                if let Some(default) = &self.default {
                    if let Err(e) = default(state, ctx) {
                        warn!(
                            "{}: discarding malformed value of {}: {}",
                            ctx.filename, ctx.tag, e
                        );
                    }
                }
            }
        }
    }
}
