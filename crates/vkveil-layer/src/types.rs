//! Plain-data parameter structures for the intercepted entry points.
//!
//! These mirror the wrapped API's create-info structures with enum and
//! flag fields stored as raw integers; handle fields keep their typed
//! `ash::vk` representation so the chassis can see exactly which values
//! need unwrapping.

use ash::vk;

/// Matches VK_ATTACHMENT_UNUSED.
pub const ATTACHMENT_UNUSED: u32 = u32::MAX;

// ── Instance / device ───────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct InstanceCreateInfo {
    pub app_name: Option<String>,
    /// Requested API version; 0 is normalized to 1.0, anything newer
    /// than the layer's supported version is clamped down.
    pub api_version: u32,
    pub enabled_extensions: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DeviceCreateInfo {
    pub enabled_extensions: Vec<String>,
    pub enabled_features: Vec<String>,
    pub queue_family_indices: Vec<u32>,
}

/// Capability data cached per physical device at device creation.
#[derive(Debug, Clone, Default)]
pub struct PhysicalDeviceProperties {
    pub device_name: String,
    pub api_version: u32,
    pub extensions: Vec<String>,
}

// ── Render pass ─────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct AttachmentDescription {
    pub format: i32,
    pub samples: u32,
    pub load_op: i32,
    pub store_op: i32,
}

#[derive(Debug, Clone, Default)]
pub struct SubpassDescription {
    /// Attachment indices; ATTACHMENT_UNUSED entries are tolerated.
    pub color_attachments: Vec<u32>,
    pub depth_stencil_attachment: Option<u32>,
    pub input_attachments: Vec<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct RenderPassCreateInfo {
    pub attachments: Vec<AttachmentDescription>,
    pub subpasses: Vec<SubpassDescription>,
}

/// Per-subpass attachment usage, derived from the subpass descriptions
/// at render-pass creation and consulted at graphics-pipeline creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubpassUsage {
    pub uses_color: bool,
    pub uses_depth_stencil: bool,
}

impl SubpassUsage {
    pub fn from_subpass(subpass: &SubpassDescription) -> Self {
        Self {
            uses_color: subpass
                .color_attachments
                .iter()
                .any(|&a| a != ATTACHMENT_UNUSED),
            uses_depth_stencil: subpass
                .depth_stencil_attachment
                .is_some_and(|a| a != ATTACHMENT_UNUSED),
        }
    }
}

// ── Swapchain ───────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SwapchainCreateInfo {
    /// The surface is created outside the layer and passes through
    /// unwrapped.
    pub surface: vk::SurfaceKHR,
    pub min_image_count: u32,
    pub image_format: i32,
    pub image_extent: (u32, u32),
    /// Wrapped handle of the swapchain being replaced, or null.
    pub old_swapchain: vk::SwapchainKHR,
}

// ── Image view ──────────────────────────────────────────────

/// Extension structures chained onto an image-view creation. The
/// sampler-Ycbcr-conversion link carries a layer-wrapped handle that
/// must be unwrapped before the chain is forwarded.
#[derive(Debug, Clone)]
pub enum ImageViewChainInfo {
    SamplerYcbcrConversion { conversion: vk::SamplerYcbcrConversion },
    Usage { usage: u32 },
}

#[derive(Debug, Clone)]
pub struct ImageViewCreateInfo {
    pub image: vk::Image,
    pub format: i32,
    pub chain: Vec<ImageViewChainInfo>,
}

#[derive(Debug, Clone, Default)]
pub struct SamplerYcbcrConversionCreateInfo {
    pub format: i32,
    pub ycbcr_model: i32,
}

// ── Descriptors ─────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct DescriptorSetLayoutBinding {
    pub binding: u32,
    pub descriptor_type: i32,
    pub descriptor_count: u32,
}

#[derive(Debug, Clone, Default)]
pub struct DescriptorSetLayoutCreateInfo {
    pub bindings: Vec<DescriptorSetLayoutBinding>,
}

#[derive(Debug, Clone)]
pub struct PipelineLayoutCreateInfo {
    pub set_layouts: Vec<vk::DescriptorSetLayout>,
}

#[derive(Debug, Clone)]
pub struct DescriptorPoolSize {
    pub descriptor_type: i32,
    pub descriptor_count: u32,
}

#[derive(Debug, Clone, Default)]
pub struct DescriptorPoolCreateInfo {
    pub max_sets: u32,
    pub pool_sizes: Vec<DescriptorPoolSize>,
}

#[derive(Debug, Clone)]
pub struct DescriptorSetAllocateInfo {
    pub descriptor_pool: vk::DescriptorPool,
    pub set_layouts: Vec<vk::DescriptorSetLayout>,
}

/// One entry of a descriptor-update-template: where in the raw update
/// payload the descriptors for a binding live. The chassis keeps a deep
/// copy of these at template creation because the later update call
/// passes only an untyped byte buffer laid out per these entries.
///
/// Payload layouts (native endianness):
///   image descriptors:  [sampler u64][image_view u64][layout u32][pad u32]
///   buffer descriptors: [buffer u64][offset u64][range u64]
#[derive(Debug, Clone)]
pub struct DescriptorUpdateTemplateEntry {
    pub dst_binding: u32,
    pub descriptor_count: u32,
    pub descriptor_type: i32,
    pub offset: usize,
    pub stride: usize,
}

/// Byte size of one image or buffer descriptor payload element.
pub const DESCRIPTOR_PAYLOAD_SIZE: usize = 24;

#[derive(Debug, Clone, Default)]
pub struct DescriptorUpdateTemplateCreateInfo {
    pub entries: Vec<DescriptorUpdateTemplateEntry>,
}

/// Whether a descriptor type's payload element starts with an image
/// info (sampler + image view) rather than a buffer info.
pub fn descriptor_type_is_image(descriptor_type: i32) -> bool {
    let ty = vk::DescriptorType::from_raw(descriptor_type);
    matches!(
        ty,
        vk::DescriptorType::SAMPLER
            | vk::DescriptorType::COMBINED_IMAGE_SAMPLER
            | vk::DescriptorType::SAMPLED_IMAGE
            | vk::DescriptorType::STORAGE_IMAGE
            | vk::DescriptorType::INPUT_ATTACHMENT
    )
}

// ── Pipelines ───────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct GraphicsPipelineCreateInfo {
    pub layout: vk::PipelineLayout,
    pub render_pass: vk::RenderPass,
    pub subpass: u32,
}

#[derive(Debug, Clone)]
pub struct RayTracingPipelineCreateInfo {
    pub layout: vk::PipelineLayout,
    pub max_recursion_depth: u32,
}

/// Chassis-internal scratch state threaded through the pipeline-creation
/// hooks so a validator can pass data it resolved in one phase to its
/// own record phase. Never exposed to the application.
#[derive(Debug, Default)]
pub struct PipelineCallState {
    /// Resolved render-pass usage per create info, `None` when the
    /// referenced render pass was never recorded.
    pub subpass_usage: Vec<Option<SubpassUsage>>,
}
