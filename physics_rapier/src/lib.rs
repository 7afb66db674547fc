//! Rapier world setup for the avatar sandbox: static level geometry and gravity.
//!
//! The level is static and the avatar is kinematic, so there is no dynamics
//! pipeline; scene queries are rebuilt whenever geometry changes.
#![forbid(unsafe_code)]

use rapier3d::prelude::*;

/// Thickness of the generated floor slab; its top face sits at `y = 0`.
const FLOOR_HALF_THICKNESS: Real = 0.1;

pub struct PhysicsWorld {
    /// Read by movement code; also defines "up" for the character controller.
    pub gravity: Vector<Real>,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    query_pipeline: QueryPipeline,
}

impl PhysicsWorld {
    pub fn new(gravity: Vector<Real>) -> Self {
        Self {
            gravity,
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            query_pipeline: QueryPipeline::new(),
        }
    }

    /// Always empty; the KCC query API still wants a body set.
    pub fn bodies(&self) -> &RigidBodySet {
        &self.bodies
    }

    pub fn colliders(&self) -> &ColliderSet {
        &self.colliders
    }

    pub fn query_pipeline(&self) -> &QueryPipeline {
        &self.query_pipeline
    }

    /// Rebuilds scene queries after level geometry was inserted.
    pub fn refresh_queries(&mut self) {
        self.query_pipeline.update(&self.colliders);
    }

    pub fn insert_static_collider(&mut self, collider: Collider) -> ColliderHandle {
        self.colliders.insert(collider)
    }

    /// Square floor slab centred on the origin with its walkable face at `y = 0`.
    pub fn insert_floor(&mut self, half_extent: Real) -> ColliderHandle {
        let floor = ColliderBuilder::cuboid(half_extent, FLOOR_HALF_THICKNESS, half_extent)
            .translation(vector![0.0, -FLOOR_HALF_THICKNESS, 0.0])
            .build();
        self.insert_static_collider(floor)
    }

    /// Axis-aligned static box given by its centre and half extents.
    pub fn insert_box(&mut self, center: Vector<Real>, half_extents: Vector<Real>) -> ColliderHandle {
        let block = ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z)
            .translation(center)
            .build();
        self.insert_static_collider(block)
    }

    pub fn collider_count(&self) -> usize {
        self.colliders.len()
    }
}
