//! GPU batch hashing using wgpu.
//! Supports the following backends:
//! - Vulkan, DX12, DX11 on Windows
//! - Vulkan, GLES 3 on Linux
//! - Metal on MacOS

use std::borrow::Cow;

use pollster::FutureExt;
use wgpu_crate::{
    util::{BufferInitDescriptor, DeviceExt},
    Backends, BindGroupDescriptor, BindGroupEntry, BufferAddress, BufferDescriptor, BufferUsages,
    CommandEncoderDescriptor, ComputePassDescriptor, ComputePipeline, ComputePipelineDescriptor,
    Device, DeviceDescriptor, Features, Instance, Limits, Maintain, MapMode, PowerPreference,
    Queue, RequestAdapterOptions, ShaderModuleDescriptor, ShaderSource,
};

use crate::{
    backend::Capability,
    error::{WordbreakError, WordbreakResult},
};

/// A single MD5 block holds at most 55 message bytes; longer candidates
/// fall back to the CPU path.
const MAX_GPU_CANDIDATE_LEN: usize = 55;

/// Words per padded message block and per digest.
const BLOCK_WORDS: usize = 16;
const DIGEST_WORDS: usize = 4;

/// The workgroup size of the kernel, kept in sync with md5.wgsl.
const WORKGROUP_SIZE: u32 = 64;

/// Probes for a usable GPU adapter. Called once at engine start.
pub fn probe() -> Capability {
    let instance = Instance::new(Backends::all());

    let adapter = instance
        .request_adapter(&RequestAdapterOptions {
            power_preference: PowerPreference::HighPerformance,
            ..Default::default()
        })
        .block_on();

    match adapter {
        Some(adapter) => {
            let info = adapter.get_info();
            Capability {
                supported: true,
                device_info: Some(format!("{} ({:?})", info.name, info.backend)),
            }
        }
        None => Capability::default(),
    }
}

/// Hashes whole candidate batches with an MD5 compute kernel.
// Most of the device plumbing has been taken from the wgpu "hello_compute" example.
pub struct WgpuHasher {
    device: Device,
    queue: Queue,
    pipeline: ComputePipeline,
}

impl WgpuHasher {
    pub fn new() -> WordbreakResult<Self> {
        Self::new_async().block_on()
    }

    async fn new_async() -> WordbreakResult<Self> {
        let instance = Instance::new(Backends::all());

        let adapter = instance
            .request_adapter(&RequestAdapterOptions {
                power_preference: PowerPreference::HighPerformance,
                ..Default::default()
            })
            .await
            .ok_or(WordbreakError::NoGpu)?;

        let (device, queue) = adapter
            .request_device(
                &DeviceDescriptor {
                    label: None,
                    features: Features::empty(),
                    limits: Limits::downlevel_defaults(),
                },
                None,
            )
            .await
            .map_err(|e| WordbreakError::Gpu(e.to_string()))?;

        let module = device.create_shader_module(ShaderModuleDescriptor {
            label: None,
            source: ShaderSource::Wgsl(Cow::Borrowed(include_str!("md5.wgsl"))),
        });

        let pipeline = device.create_compute_pipeline(&ComputePipelineDescriptor {
            label: None,
            layout: None,
            module: &module,
            entry_point: "md5_kernel",
        });

        Ok(WgpuHasher {
            device,
            queue,
            pipeline,
        })
    }

    /// Computes the lowercase hex MD5 digest of every candidate, in order.
    pub fn hash_batch(&self, candidates: &[String]) -> WordbreakResult<Vec<String>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let mut blocks = Vec::with_capacity(candidates.len() * BLOCK_WORDS);
        for candidate in candidates {
            blocks.extend_from_slice(&pad_block(candidate)?);
        }

        let size = (candidates.len() * DIGEST_WORDS * 4) as BufferAddress;

        let staging_buffer = self.device.create_buffer(&BufferDescriptor {
            label: Some("Staging Buffer"),
            size,
            usage: BufferUsages::MAP_READ | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let block_buffer = self.device.create_buffer_init(&BufferInitDescriptor {
            label: Some("Block Buffer"),
            contents: bytemuck::cast_slice(&blocks),
            usage: BufferUsages::STORAGE,
        });

        let digest_buffer = self.device.create_buffer(&BufferDescriptor {
            label: Some("Digest Buffer"),
            size,
            usage: BufferUsages::STORAGE | BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        let bind_group_layout = self.pipeline.get_bind_group_layout(0);
        let bind_group = self.device.create_bind_group(&BindGroupDescriptor {
            label: None,
            layout: &bind_group_layout,
            entries: &[
                BindGroupEntry {
                    binding: 0,
                    resource: block_buffer.as_entire_binding(),
                },
                BindGroupEntry {
                    binding: 1,
                    resource: digest_buffer.as_entire_binding(),
                },
            ],
        });

        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor { label: None });
        {
            let mut cpass = encoder.begin_compute_pass(&ComputePassDescriptor { label: None });
            cpass.set_pipeline(&self.pipeline);
            cpass.set_bind_group(0, &bind_group, &[]);
            cpass.dispatch_workgroups(
                (candidates.len() as u32).div_ceil(WORKGROUP_SIZE).max(1),
                1,
                1,
            );
        }
        encoder.copy_buffer_to_buffer(&digest_buffer, 0, &staging_buffer, 0, size);

        self.queue.submit(Some(encoder.finish()));

        let buffer_slice = staging_buffer.slice(..);

        let (sender, receiver) = crossbeam_channel::bounded(1);
        buffer_slice.map_async(MapMode::Read, move |v| sender.send(v).unwrap());

        self.device.poll(Maintain::Wait);

        match receiver.recv() {
            Ok(Ok(())) => (),
            Ok(Err(e)) => return Err(WordbreakError::Gpu(e.to_string())),
            Err(_) => return Err(WordbreakError::Gpu("device lost".to_owned())),
        }

        let data = buffer_slice.get_mapped_range();
        let words: Vec<u32> = bytemuck::cast_slice(&data).to_vec();

        drop(data);
        staging_buffer.unmap();

        let digests = words
            .chunks_exact(DIGEST_WORDS)
            .map(|digest| {
                let mut bytes = [0u8; DIGEST_WORDS * 4];
                for (chunk, word) in bytes.chunks_exact_mut(4).zip(digest) {
                    chunk.copy_from_slice(&word.to_le_bytes());
                }
                hex::encode(bytes)
            })
            .collect();

        Ok(digests)
    }
}

/// Pads a candidate into one little-endian MD5 message block.
fn pad_block(candidate: &str) -> WordbreakResult<[u32; BLOCK_WORDS]> {
    let bytes = candidate.as_bytes();

    if bytes.len() > MAX_GPU_CANDIDATE_LEN {
        return Err(WordbreakError::Gpu(format!(
            "candidate of {} bytes exceeds a single MD5 block",
            bytes.len()
        )));
    }

    let mut block = [0u8; BLOCK_WORDS * 4];
    block[..bytes.len()].copy_from_slice(bytes);
    block[bytes.len()] = 0x80;
    block[56..64].copy_from_slice(&((bytes.len() as u64) * 8).to_le_bytes());

    let mut words = [0u32; BLOCK_WORDS];
    for (word, chunk) in words.iter_mut().zip(block.chunks_exact(4)) {
        *word = u32::from_le_bytes(chunk.try_into().expect("chunk is 4 bytes"));
    }

    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_block_empty() {
        let block = pad_block("").unwrap();

        assert_eq!(0x80, block[0] & 0xff);
        assert_eq!(0, block[14]);
    }

    #[test]
    fn test_pad_block_length_in_bits() {
        let block = pad_block("abc").unwrap();

        // "abc" + 0x80 marker, little endian
        assert_eq!(u32::from_le_bytes(*b"abc\x80"), block[0]);
        assert_eq!(24, block[14]);
        assert_eq!(0, block[15]);
    }

    #[test]
    fn test_pad_block_rejects_long_candidates() {
        let long = "x".repeat(MAX_GPU_CANDIDATE_LEN + 1);

        assert!(pad_block(&long).is_err());
    }
}
