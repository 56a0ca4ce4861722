use super::common::kernel_common;
use super::KernelContext;
use crate::backend::{Backend, DeviceInfo};
use crate::common::{to_u32, FftError};
use crate::kernel_call::{KernelArg, KernelCall, LaunchGeometry, NdRange, Param, Stage};
use crate::math_utils::alignup;
use crate::source::{KernelSource, SourceBuilder};
use crate::Precision;

/// Computes the edge of the square tile used by the transpose kernel.
///
/// Starts at `cap` and halves until one tile of complex samples fits in the device's local memory, and until one
/// work-item per tile element fits in a work-group.
///
/// ```
/// use rustfft_gpu::{transpose_block_size, DeviceInfo, Precision};
///
/// let info = DeviceInfo { local_mem_size: 48 * 1024, max_work_group_size: 1024 };
/// assert_eq!(transpose_block_size(&info, Precision::Single, 128), 32);
/// ```
pub fn block_size(info: &DeviceInfo, precision: Precision, cap: usize) -> usize {
    let mut block_size = cap.max(1);
    while block_size > 1 && block_size * block_size * precision.complex_size() > info.local_mem_size {
        block_size /= 2;
    }
    while block_size > 1 && block_size * block_size > info.max_work_group_size {
        block_size /= 2;
    }
    block_size
}

/// Emits a shared-memory tiled transpose of a `width` x `height` row-major matrix.
///
/// The launch grid is padded to whole tiles, so both the load and the store are guarded. The guards are plain `if`
/// statements: every work-item of the group must reach the barrier.
pub(crate) fn transpose_source(mut o: SourceBuilder, block_size: usize) -> KernelSource {
    kernel_common(&mut o);

    let ids = [
        ("global_x", o.global_id(0)),
        ("global_y", o.global_id(1)),
        ("local_x", o.local_id(0)),
        ("local_y", o.local_id(1)),
        ("group_x", o.group_id(0)),
        ("group_y", o.group_id(1)),
    ];
    let params = vec![
        Param::const_buffer("input"),
        Param::buffer("output"),
        Param::uint("width"),
        Param::uint("height"),
    ];
    o.kernel("transpose", params, |o| {
        o.shared_array("block", block_size * block_size);
        for (name, id) in ids.iter() {
            o.line(format!("const size_t {} = {};", name, id));
        }
        o.line(format!("const size_t block_size = {};", block_size));

        o.block("if(global_x < width && global_y < height)", |o| {
            o.line("block[local_x + local_y * block_size] = input[global_x + global_y * width];");
        });

        o.barrier();

        o.line("const size_t target_x = local_x + group_y * block_size;");
        o.line("const size_t target_y = local_y + group_x * block_size;");
        o.block("if(target_x < height && target_y < width)", |o| {
            o.line("output[target_x + target_y * height] = block[local_y + local_x * block_size];");
        });
    })
}

/// Builds the kernel call transposing `input` (`height` rows of `width`) into `output` (`width` rows of `height`)
pub(crate) fn transpose_kernel<B: Backend>(
    ctx: &mut KernelContext<B>,
    block_cap: usize,
    width: usize,
    height: usize,
    input: &B::Buffer,
    output: &B::Buffer,
) -> Result<KernelCall<B>, FftError> {
    let block_size = block_size(&ctx.backend.device_info(), ctx.precision, block_cap);
    let source = transpose_source(ctx.builder(), block_size);
    let stage = Stage::Transpose {
        width,
        height,
        block_size,
    };
    let compiled = ctx.compile(source, stage, false)?;

    let padded_width = alignup(width, block_size);
    let padded_height = alignup(height, block_size);
    let geometry = LaunchGeometry::new(
        NdRange::d2(padded_width, padded_height),
        NdRange::d2(block_size, block_size),
    )?;

    let args = vec![
        KernelArg::Buffer(input.clone()),
        KernelArg::Buffer(output.clone()),
        KernelArg::Uint(to_u32("width", width)?),
        KernelArg::Uint(to_u32("height", height)?),
    ];
    let desc = format!(
        "transpose{{w={}({}), h={}({}), bs={}}}",
        width, padded_width, height, padded_height, block_size
    );
    ctx.call(false, desc, compiled, args, geometry, stage)
}
