//! Frame stacking wrapper
//!
//! Wraps an environment that emits single frames of shape `(H, W)` and
//! presents observations of shape `(depth, H, W)` made of the `depth` most
//! recent frames, oldest first.

use std::collections::VecDeque;

use anyhow::{ensure, Result};

use super::{Environment, SpaceInfo, StepResult};

/// Stacks the last `depth` frames of the wrapped environment
#[derive(Debug, Clone)]
pub struct FrameStack<E> {
    inner: E,
    depth: usize,
    frames: VecDeque<Vec<f32>>,
}

impl<E: Environment> FrameStack<E> {
    /// Wrap `inner`, stacking `depth` frames (at least one)
    pub fn new(inner: E, depth: usize) -> Self {
        let depth = depth.max(1);
        Self { inner, depth, frames: VecDeque::with_capacity(depth) }
    }

    /// Number of stacked frames
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Borrow the wrapped environment
    pub fn inner(&self) -> &E {
        &self.inner
    }

    fn stacked(&self) -> Vec<f32> {
        self.frames.iter().flatten().copied().collect()
    }

    fn check_frame(&self, frame: &[f32]) -> Result<()> {
        let frame_len = self.inner.observation_space().numel();
        ensure!(
            frame.len() == frame_len,
            "frame has {} elements, observation space declares {}",
            frame.len(),
            frame_len
        );
        Ok(())
    }
}

impl<E: Environment> Environment for FrameStack<E> {
    fn reset(&mut self) -> Result<Vec<f32>> {
        let frame = self.inner.reset()?;
        self.check_frame(&frame)?;

        self.frames.clear();
        for _ in 0..self.depth {
            self.frames.push_back(frame.clone());
        }
        Ok(self.stacked())
    }

    fn step(&mut self, action: i64) -> Result<StepResult> {
        let mut result = self.inner.step(action)?;
        self.check_frame(&result.observation)?;

        if self.frames.len() == self.depth {
            self.frames.pop_front();
        }
        self.frames.push_back(std::mem::take(&mut result.observation));
        result.observation = self.stacked();
        Ok(result)
    }

    fn observation_space(&self) -> SpaceInfo {
        let inner = self.inner.observation_space();
        let mut shape = Vec::with_capacity(inner.shape.len() + 1);
        shape.push(self.depth);
        shape.extend_from_slice(&inner.shape);
        SpaceInfo { shape, space_type: inner.space_type }
    }

    fn action_space(&self) -> SpaceInfo {
        self.inner.action_space()
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }
}
