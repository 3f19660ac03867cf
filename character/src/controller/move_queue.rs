use std::collections::VecDeque;

use log::trace;

use crate::{
    constants::{MIN_SEGMENT_DISTANCE, MOVE_QUEUE_CAPACITY},
    math::{Vec3, along, is_finite, try_normalize},
};

/// Which part of a segment's displacement is left out of the reported velocity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum VelocityCorrection {
    /// Counts fully toward velocity.
    #[default]
    None,
    /// Excluded entirely (steps, snapping, depenetration).
    Full,
    /// Only the part along `up` is excluded.
    Vertical,
    /// Only the part across `up` is excluded.
    Horizontal,
}

impl VelocityCorrection {
    /// Portion of `displacement` to exclude from velocity.
    pub fn excluded(self, displacement: &Vec3, up: &Vec3) -> Vec3 {
        match self {
            VelocityCorrection::None => Vec3::zeros(),
            VelocityCorrection::Full => *displacement,
            VelocityCorrection::Vertical => along(displacement, up),
            VelocityCorrection::Horizontal => displacement - along(displacement, up),
        }
    }
}

/// One displacement the move loop will attempt.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MoveSegment {
    /// Unit direction.
    pub direction: Vec3,
    /// Meters, non-negative.
    pub distance: f32,
    /// Deflect along obstacles on hit. When false the segment stops dead.
    pub slide: bool,
    pub correction: VelocityCorrection,
}

impl MoveSegment {
    /// Split a displacement into direction and distance.
    ///
    /// Returns `None` for non-finite or negligible displacements.
    pub fn from_displacement(
        displacement: Vec3,
        slide: bool,
        correction: VelocityCorrection,
    ) -> Option<Self> {
        if !is_finite(&displacement) {
            return None;
        }
        let distance = displacement.norm();
        if distance <= MIN_SEGMENT_DISTANCE {
            return None;
        }
        Some(Self {
            direction: try_normalize(&displacement)?,
            distance,
            slide,
            correction,
        })
    }

    pub fn displacement(&self) -> Vec3 {
        self.direction * self.distance
    }
}

/// Bounded double-ended queue of pending segments.
///
/// `add_first` is used for continuations and step sequences that must run before anything queued
/// later. When full, the incoming segment is dropped.
#[derive(Debug)]
pub struct MoveQueue {
    segments: VecDeque<MoveSegment>,
    capacity: usize,
}

impl Default for MoveQueue {
    fn default() -> Self {
        Self::with_capacity(MOVE_QUEUE_CAPACITY)
    }
}

impl MoveQueue {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            segments: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Queue at the front. Returns false if the queue was full.
    pub fn add_first(&mut self, segment: MoveSegment) -> bool {
        if self.segments.len() >= self.capacity {
            trace!("move queue full, dropping {segment:?}");
            return false;
        }
        self.segments.push_front(segment);
        true
    }

    /// Queue at the back. Returns false if the queue was full.
    pub fn add_last(&mut self, segment: MoveSegment) -> bool {
        if self.segments.len() >= self.capacity {
            trace!("move queue full, dropping {segment:?}");
            return false;
        }
        self.segments.push_back(segment);
        true
    }

    pub fn pop(&mut self) -> Option<MoveSegment> {
        self.segments.pop_front()
    }

    pub fn clear(&mut self) {
        self.segments.clear();
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
