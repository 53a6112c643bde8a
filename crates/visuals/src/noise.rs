use rand::prelude::*;
use renderer::TextureImage;

/// Square grey noise image: every texel repeats one random byte across RGB.
///
/// The same `seed` always yields the same texels.
pub fn noise_image(size: u32, seed: u64) -> TextureImage {
    let mut rng = StdRng::seed_from_u64(seed);
    let texels = size as usize * size as usize;
    let mut rgb = Vec::with_capacity(texels * 3);
    for _ in 0..texels {
        let value: u8 = rng.gen();
        rgb.extend_from_slice(&[value, value, value]);
    }
    TextureImage {
        width: size,
        height: size,
        rgb,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn texels_are_grey() {
        let image = noise_image(256, 7);
        assert!(image.is_consistent());
        assert_eq!((image.width, image.height), (256, 256));
        assert!(image
            .rgb
            .chunks_exact(3)
            .all(|texel| texel[0] == texel[1] && texel[1] == texel[2]));
    }

    #[test]
    fn seed_is_deterministic() {
        assert_eq!(noise_image(16, 42), noise_image(16, 42));
        assert_ne!(noise_image(16, 42).rgb, noise_image(16, 43).rgb);
    }

    #[test]
    fn noise_is_not_flat() {
        let image = noise_image(64, 1);
        let first = image.rgb[0];
        assert!(image.rgb.iter().any(|&value| value != first));
    }
}
