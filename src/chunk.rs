// src/chunk.rs

/// One block of planar stereo samples, as produced by a single engine
/// `play()` call.
#[derive(Debug, Clone)]
pub struct SampleChunk {
    frames: usize,
    data: Box<[f32]>, // planar: [L0..LN, R0..RN]
}

impl SampleChunk {
    pub const CHANNELS: usize = 2;

    /// Allocate a silent chunk of `frames` frames.
    pub fn new(frames: usize) -> Self {
        Self {
            frames,
            data: vec![0.0; frames * Self::CHANNELS].into_boxed_slice(),
        }
    }

    #[inline]
    pub fn frames(&self) -> usize {
        self.frames
    }

    #[inline]
    pub fn clear(&mut self) {
        self.data.fill(0.0);
    }

    #[inline]
    pub fn left(&self) -> &[f32] {
        &self.data[..self.frames]
    }

    #[inline]
    pub fn right(&self) -> &[f32] {
        &self.data[self.frames..]
    }

    #[inline]
    pub fn channel(&self, ch: usize) -> &[f32] {
        let start = ch * self.frames;
        &self.data[start..start + self.frames]
    }

    #[inline]
    pub fn channel_mut(&mut self, ch: usize) -> &mut [f32] {
        let start = ch * self.frames;
        &mut self.data[start..start + self.frames]
    }

    /// Copy engine output into this chunk.
    ///
    /// Shorter sources leave the tail silent; longer ones are truncated.
    pub fn copy_from(&mut self, left: &[f32], right: &[f32]) {
        for (ch, src) in [left, right].into_iter().enumerate() {
            let dst = self.channel_mut(ch);
            let n = src.len().min(dst.len());
            dst[..n].copy_from_slice(&src[..n]);
            dst[n..].fill(0.0);
        }
    }

    /// Copy `out_left.len()` frames starting at `offset` into the outputs.
    ///
    /// Frames past the end of the chunk are written as silence.
    #[inline]
    pub fn read_into(&self, offset: usize, out_left: &mut [f32], out_right: &mut [f32]) {
        for (src, dst) in [(self.left(), out_left), (self.right(), out_right)] {
            let start = offset.min(src.len());
            let n = (src.len() - start).min(dst.len());
            dst[..n].copy_from_slice(&src[start..start + n]);
            dst[n..].fill(0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_from_pads_and_truncates() {
        let mut chunk = SampleChunk::new(4);
        chunk.copy_from(&[1.0, 2.0], &[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(chunk.left(), &[1.0, 2.0, 0.0, 0.0]);
        assert_eq!(chunk.right(), &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_read_into_past_end_is_silent() {
        let mut chunk = SampleChunk::new(4);
        chunk.copy_from(&[1.0, 2.0, 3.0, 4.0], &[5.0, 6.0, 7.0, 8.0]);

        let mut l = [9.0; 3];
        let mut r = [9.0; 3];
        chunk.read_into(2, &mut l, &mut r);
        assert_eq!(l, [3.0, 4.0, 0.0]);
        assert_eq!(r, [7.0, 8.0, 0.0]);

        chunk.read_into(10, &mut l, &mut r);
        assert_eq!(l, [0.0; 3]);
    }
}
