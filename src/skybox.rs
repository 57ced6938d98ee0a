//! Sky box texture generation
//!
//! A dim random-noise image with a short mip chain, built on the CPU
//! since wgpu has no equivalent of `glGenerateMipmap`.

use rand::Rng;

pub const SKYBOX_SIZE: u32 = 256;
pub const SKYBOX_MIP_LEVELS: u32 = 3;

/// One RGBA8 mip level
#[derive(Debug, Clone)]
pub struct MipLevel {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// Noise with every colour channel in [0, 128) and alpha fixed at 1.
pub fn noise_image<R: Rng + ?Sized>(rng: &mut R, width: u32, height: u32) -> MipLevel {
    let mut data = vec![0u8; (width * height * 4) as usize];
    for texel in data.chunks_exact_mut(4) {
        texel[0] = rng.gen_range(0..128);
        texel[1] = rng.gen_range(0..128);
        texel[2] = rng.gen_range(0..128);
        texel[3] = 1;
    }
    MipLevel { width, height, data }
}

/// 2x2 box filter down to half size.
pub fn downsample(level: &MipLevel) -> MipLevel {
    let width = (level.width / 2).max(1);
    let height = (level.height / 2).max(1);
    let src_width = level.width as usize;
    let mut data = vec![0u8; (width * height * 4) as usize];

    for y in 0..height as usize {
        for x in 0..width as usize {
            let sx = (x * 2).min(level.width as usize - 1);
            let sy = (y * 2).min(level.height as usize - 1);
            let sx1 = (sx + 1).min(level.width as usize - 1);
            let sy1 = (sy + 1).min(level.height as usize - 1);
            for c in 0..4 {
                let sum: u32 = [(sx, sy), (sx1, sy), (sx, sy1), (sx1, sy1)]
                    .iter()
                    .map(|&(px, py)| level.data[(py * src_width + px) * 4 + c] as u32)
                    .sum();
                data[(y * width as usize + x) * 4 + c] = ((sum + 2) / 4) as u8;
            }
        }
    }

    MipLevel { width, height, data }
}

/// Base level plus `levels - 1` downsampled levels.
pub fn mip_chain(base: MipLevel, levels: u32) -> Vec<MipLevel> {
    let mut chain = Vec::with_capacity(levels as usize);
    let mut current = base;
    for _ in 1..levels {
        let next = downsample(&current);
        chain.push(current);
        current = next;
    }
    chain.push(current);
    chain
}

/// The full sky box texture.
pub fn skybox_texture<R: Rng + ?Sized>(rng: &mut R) -> Vec<MipLevel> {
    mip_chain(noise_image(rng, SKYBOX_SIZE, SKYBOX_SIZE), SKYBOX_MIP_LEVELS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_noise_channel_ranges() {
        let mut rng = StdRng::seed_from_u64(7);
        let image = noise_image(&mut rng, 16, 16);
        assert_eq!(image.data.len(), 16 * 16 * 4);
        for texel in image.data.chunks_exact(4) {
            assert!(texel[..3].iter().all(|&c| c < 128));
            assert_eq!(texel[3], 1);
        }
    }

    #[test]
    fn test_downsample_averages_blocks() {
        let level = MipLevel {
            width: 2,
            height: 2,
            data: vec![
                0, 10, 100, 1, //
                4, 10, 100, 1, //
                8, 10, 100, 1, //
                12, 10, 100, 1,
            ],
        };
        let half = downsample(&level);
        assert_eq!((half.width, half.height), (1, 1));
        assert_eq!(half.data, vec![6, 10, 100, 1]);
    }

    #[test]
    fn test_skybox_mip_chain_sizes() {
        let mut rng = StdRng::seed_from_u64(1);
        let chain = skybox_texture(&mut rng);
        let sizes: Vec<_> = chain.iter().map(|l| (l.width, l.height)).collect();
        assert_eq!(sizes, vec![(256, 256), (128, 128), (64, 64)]);
        for level in &chain {
            assert_eq!(level.data.len(), (level.width * level.height * 4) as usize);
        }
    }
}
