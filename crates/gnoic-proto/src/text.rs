//! Protobuf text format rendering backed by the embedded descriptor set.

use once_cell::sync::Lazy;
use prost::{Message, Name};
use prost_reflect::text_format::FormatOptions;
use prost_reflect::{DescriptorPool, DynamicMessage};

use crate::error::ProtoError;

/// Serialized `FileDescriptorSet` of every compiled `.proto` file.
pub const FILE_DESCRIPTOR_SET: &[u8] =
    include_bytes!(concat!(env!("OUT_DIR"), "/gnoic_descriptor.bin"));

static POOL: Lazy<Result<DescriptorPool, String>> =
    Lazy::new(|| DescriptorPool::decode(FILE_DESCRIPTOR_SET).map_err(|e| e.to_string()));

/// Returns the descriptor pool built from [`FILE_DESCRIPTOR_SET`].
pub fn descriptor_pool() -> Result<&'static DescriptorPool, ProtoError> {
    POOL.as_ref().map_err(|e| ProtoError::Descriptor(e.clone()))
}

/// Renders a message in multi-line protobuf text format.
///
/// # Errors
///
/// Returns an error if the message type is not part of the embedded
/// descriptors.
pub fn to_prototext<M: Message + Name>(message: &M) -> Result<String, ProtoError> {
    let full_name = M::full_name();
    let descriptor = descriptor_pool()?
        .get_message_by_name(&full_name)
        .ok_or(ProtoError::UnknownMessage(full_name))?;
    let dynamic = DynamicMessage::decode(descriptor, message.encode_to_vec().as_slice())?;
    Ok(dynamic.to_text_format_with_options(&FormatOptions::new().pretty(true)))
}
