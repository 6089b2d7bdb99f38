// SPDX-License-Identifier: CEPL-1.0
use std::io::Cursor;
use std::mem::{offset_of, size_of};
use std::path::Path;
use std::rc::Rc;

use ash::util::read_spv;
use ash::vk;
use bytemuck::{Pod, Zeroable};
use tracing::info;

use crate::error::{Error, Result, VkResultExt};
use crate::gpu::{name_object, Gpu, PipelineDesc};
use crate::resources::{Buffer, Pipeline};

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub color: [f32; 3],
}

const F: f32 = 0.75;

/// Counter-clockwise in a Y-up frame.
pub const TRIANGLE: [Vertex; 3] = [
    Vertex {
        position: [-0.866 * F, -0.5 * F, 0.0],
        color: [0.0, 1.0, 0.0],
    },
    Vertex {
        position: [0.866 * F, -0.5 * F, 0.0],
        color: [0.0, 0.0, 1.0],
    },
    Vertex {
        position: [0.0, F, 0.0],
        color: [1.0, 0.0, 0.0],
    },
];

pub const VERTEX_STRIDE: u32 = size_of::<Vertex>() as u32;

pub fn vertex_attributes() -> [vk::VertexInputAttributeDescription; 2] {
    [
        vk::VertexInputAttributeDescription {
            location: 0,
            binding: 0,
            format: vk::Format::R32G32B32_SFLOAT,
            offset: offset_of!(Vertex, position) as u32,
        },
        vk::VertexInputAttributeDescription {
            location: 1,
            binding: 0,
            format: vk::Format::R32G32B32_SFLOAT,
            offset: offset_of!(Vertex, color) as u32,
        },
    ]
}

/// Vertex and fragment SPIR-V, kept as opaque bytes until pipeline creation.
#[derive(Clone, Debug)]
pub struct ShaderBlobs {
    pub vertex: Vec<u8>,
    pub fragment: Vec<u8>,
}

impl ShaderBlobs {
    /// The shaders compiled by build.rs.
    pub fn embedded() -> Self {
        Self {
            vertex: include_bytes!(concat!(env!("OUT_DIR"), "/forward.vert.spv")).to_vec(),
            fragment: include_bytes!(concat!(env!("OUT_DIR"), "/color.frag.spv")).to_vec(),
        }
    }

    /// Embedded shaders, with either stage replaced by a file when given.
    pub fn load(vertex: Option<&Path>, fragment: Option<&Path>) -> Result<Self> {
        let mut blobs = Self::embedded();
        if let Some(path) = vertex {
            blobs.vertex = read_blob(path)?;
        }
        if let Some(path) = fragment {
            blobs.fragment = read_blob(path)?;
        }
        Ok(blobs)
    }
}

fn read_blob(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|source| Error::ShaderFile {
        path: path.to_path_buf(),
        source,
    })
}

pub fn spirv_words(bytes: &[u8]) -> Result<Vec<u32>> {
    read_spv(&mut Cursor::new(bytes)).map_err(Error::Spirv)
}

/// Everything the single draw call binds. Pipeline first so it is destroyed
/// before the buffer.
pub struct DrawResources {
    pipeline: Pipeline,
    vertex_buffer: Buffer,
    vertex_count: u32,
}

impl DrawResources {
    pub fn new(
        gpu: &Rc<dyn Gpu>,
        color_format: vk::Format,
        shaders: &ShaderBlobs,
        vertex_bytes: &[u8],
    ) -> Result<Self> {
        let vertex_code = spirv_words(&shaders.vertex)?;
        let fragment_code = spirv_words(&shaders.fragment)?;
        let attributes = vertex_attributes();

        let handles = gpu
            .create_pipeline(&PipelineDesc {
                vertex_code: &vertex_code,
                fragment_code: &fragment_code,
                color_format,
                vertex_stride: VERTEX_STRIDE,
                attributes: &attributes,
            })
            .call("vkCreateGraphicsPipelines")?;
        let pipeline = Pipeline::new(gpu, handles);
        name_object(&**gpu, handles.pipeline, "triangle pipeline");
        name_object(&**gpu, handles.layout, "triangle pipeline layout");

        let allocation = gpu
            .create_vertex_buffer(vertex_bytes)
            .call("create_vertex_buffer")?;
        let vertex_buffer = Buffer::new(gpu, allocation);
        name_object(&**gpu, allocation.buffer, "triangle vertices");
        name_object(&**gpu, allocation.memory, "triangle vertex memory");
        let vertex_count = (vertex_bytes.len() / VERTEX_STRIDE as usize) as u32;

        info!(
            "pipeline ready ({} vertices, {} bytes of vertex data)",
            vertex_count,
            vertex_bytes.len()
        );
        Ok(Self {
            pipeline,
            vertex_buffer,
            vertex_count,
        })
    }

    pub fn pipeline(&self) -> vk::Pipeline {
        self.pipeline.raw().pipeline
    }

    pub fn vertex_buffer(&self) -> vk::Buffer {
        self.vertex_buffer.raw().buffer
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }
}
