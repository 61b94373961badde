//! Arena scene graph hosting animated entities
//!
//! Entities live in a [`SlotMap`] keyed by [`EntityId`]. Each entity has an
//! explicit set of optional components: a skinned renderer, an IK
//! constraint and an animator. An animator drives the skinned renderers on
//! its own entity and on descendants that do not carry an animator of
//! their own; those targets are resolved with a stack walk and cached until
//! the hierarchy changes.

mod skinned;
mod transform;

use glam::Mat4;
use slotmap::{SlotMap, new_key_type};

use crate::animation::ik::IkConstraint;
use crate::animator::{Animator, AnimatorOwner, FrameContext};
use crate::error::{AnimError, Result};

pub use skinned::SkinnedMeshRenderer;
pub use transform::Transform;

new_key_type! {
    /// Stable handle to an entity in a [`Scene`]
    pub struct EntityId;
}

/// An animator plus the renderers it was last resolved to drive
#[derive(Debug, Clone)]
struct AnimatorSlot {
    animator: Animator,
    targets: Vec<EntityId>,
    resolved_generation: Option<u64>,
}

/// A node of the scene graph
#[derive(Debug, Clone, Default)]
pub struct Entity {
    pub name: String,
    pub transform: Transform,
    pub ik: Option<IkConstraint>,
    parent: Option<EntityId>,
    children: Vec<EntityId>,
    skinned: Option<SkinnedMeshRenderer>,
    animator: Option<AnimatorSlot>,
}

impl Entity {
    pub fn parent(&self) -> Option<EntityId> {
        self.parent
    }

    pub fn children(&self) -> &[EntityId] {
        &self.children
    }

    pub fn skinned(&self) -> Option<&SkinnedMeshRenderer> {
        self.skinned.as_ref()
    }

    pub fn skinned_mut(&mut self) -> Option<&mut SkinnedMeshRenderer> {
        self.skinned.as_mut()
    }

    pub fn animator(&self) -> Option<&Animator> {
        self.animator.as_ref().map(|slot| &slot.animator)
    }

    pub fn animator_mut(&mut self) -> Option<&mut Animator> {
        self.animator.as_mut().map(|slot| &mut slot.animator)
    }
}

/// Entity container and per-frame driver
#[derive(Debug, Default)]
pub struct Scene {
    entities: SlotMap<EntityId, Entity>,
    /// Bumped whenever the hierarchy or component membership changes
    generation: u64,
    bindings_generation: Option<u64>,
    walk_stack: Vec<EntityId>,
    animated: Vec<EntityId>,
}

/// Depth-first, pre-order walk from `owner` collecting skinned renderers.
/// Descendants with their own animator end the walk down that branch.
fn collect_skinned_targets(
    entities: &SlotMap<EntityId, Entity>,
    owner: EntityId,
    stack: &mut Vec<EntityId>,
    out: &mut Vec<EntityId>,
) {
    out.clear();
    stack.clear();
    stack.push(owner);

    while let Some(id) = stack.pop() {
        let Some(entity) = entities.get(id) else {
            continue;
        };
        if id != owner && entity.animator.is_some() {
            continue;
        }
        if entity.skinned.is_some() {
            out.push(id);
        }
        stack.extend(entity.children.iter().rev().copied());
    }
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Create a root entity
    pub fn spawn(&mut self, name: impl Into<String>) -> EntityId {
        self.generation += 1;
        self.entities.insert(Entity {
            name: name.into(),
            ..Entity::default()
        })
    }

    /// Create an entity under `parent`
    pub fn spawn_child(&mut self, parent: EntityId, name: impl Into<String>) -> Result<EntityId> {
        if !self.entities.contains_key(parent) {
            return Err(AnimError::UnknownEntity);
        }
        let id = self.spawn(name);
        self.set_parent(id, Some(parent))?;
        Ok(id)
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<EntityId> {
        self.entities
            .iter()
            .find(|(_, entity)| entity.name == name)
            .map(|(id, _)| id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.entities.iter()
    }

    /// Move `child` under `parent` (or to the root with `None`)
    pub fn set_parent(&mut self, child: EntityId, parent: Option<EntityId>) -> Result<()> {
        if !self.entities.contains_key(child) {
            return Err(AnimError::UnknownEntity);
        }
        if let Some(parent) = parent {
            if !self.entities.contains_key(parent) {
                return Err(AnimError::UnknownEntity);
            }
            if self.is_ancestor_or_self(child, parent) {
                return Err(AnimError::HierarchyCycle {
                    child: self.entities[child].name.clone(),
                    parent: self.entities[parent].name.clone(),
                });
            }
        }

        if let Some(old_parent) = self.entities[child].parent {
            if let Some(old) = self.entities.get_mut(old_parent) {
                old.children.retain(|&c| c != child);
            }
        }
        if let Some(parent) = parent {
            self.entities[parent].children.push(child);
        }
        self.entities[child].parent = parent;
        self.generation += 1;
        Ok(())
    }

    /// Whether `ancestor` is `id` or one of its ancestors
    fn is_ancestor_or_self(&self, ancestor: EntityId, id: EntityId) -> bool {
        let mut current = Some(id);
        let mut remaining = self.entities.len();
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            if remaining == 0 {
                break;
            }
            remaining -= 1;
            current = self.entities.get(node).and_then(|e| e.parent);
        }
        false
    }

    /// Remove an entity and all of its descendants
    pub fn despawn(&mut self, id: EntityId) -> Result<()> {
        let Some(parent) = self.entities.get(id).map(|e| e.parent) else {
            return Err(AnimError::UnknownEntity);
        };
        if let Some(parent) = parent.and_then(|p| self.entities.get_mut(p)) {
            parent.children.retain(|&c| c != id);
        }

        self.walk_stack.clear();
        self.walk_stack.push(id);
        while let Some(node) = self.walk_stack.pop() {
            if let Some(entity) = self.entities.remove(node) {
                self.walk_stack.extend(entity.children);
            }
        }
        self.generation += 1;
        Ok(())
    }

    /// Attach or remove the skinned renderer of an entity
    pub fn set_skinned(
        &mut self,
        id: EntityId,
        skinned: Option<SkinnedMeshRenderer>,
    ) -> Result<()> {
        let entity = self.entities.get_mut(id).ok_or(AnimError::UnknownEntity)?;
        entity.skinned = skinned;
        self.generation += 1;
        Ok(())
    }

    /// Attach or remove the animator of an entity
    pub fn set_animator(&mut self, id: EntityId, animator: Option<Animator>) -> Result<()> {
        let entity = self.entities.get_mut(id).ok_or(AnimError::UnknownEntity)?;
        entity.animator = animator.map(|animator| AnimatorSlot {
            animator,
            targets: Vec::new(),
            resolved_generation: None,
        });
        self.generation += 1;
        Ok(())
    }

    pub fn set_ik(&mut self, id: EntityId, ik: Option<IkConstraint>) -> Result<()> {
        let entity = self.entities.get_mut(id).ok_or(AnimError::UnknownEntity)?;
        entity.ik = ik;
        Ok(())
    }

    /// World matrix of an entity, identity for unknown ids
    pub fn world_matrix(&self, id: EntityId) -> Mat4 {
        let mut world = Mat4::IDENTITY;
        let mut current = Some(id);
        let mut remaining = self.entities.len();
        while let Some(node) = current {
            let Some(entity) = self.entities.get(node) else {
                break;
            };
            if remaining == 0 {
                break;
            }
            remaining -= 1;
            world = entity.transform.matrix() * world;
            current = entity.parent;
        }
        world
    }

    fn parent_world(&self, id: EntityId) -> Mat4 {
        self.entities
            .get(id)
            .and_then(|entity| entity.parent)
            .map_or(Mat4::IDENTITY, |parent| self.world_matrix(parent))
    }

    /// Renderers an animator on `id` drives, in traversal order
    ///
    /// Uses the cached resolution when the hierarchy has not changed.
    pub fn skinned_targets(&mut self, id: EntityId) -> &[EntityId] {
        self.refresh_targets(id);
        self.entities
            .get(id)
            .and_then(|entity| entity.animator.as_ref())
            .map_or(&[], |slot| slot.targets.as_slice())
    }

    fn refresh_targets(&mut self, id: EntityId) {
        let generation = self.generation;
        let Some(slot) = self.entities.get_mut(id).and_then(|e| e.animator.as_mut()) else {
            return;
        };
        if slot.resolved_generation == Some(generation) {
            return;
        }
        let mut targets = std::mem::take(&mut slot.targets);

        collect_skinned_targets(&self.entities, id, &mut self.walk_stack, &mut targets);
        for &target in &targets {
            if let Some(skinned) = self.entities.get_mut(target).and_then(|e| e.skinned.as_mut()) {
                skinned.set_driven_by_animator(true);
            }
        }
        log::debug!(
            "Animator on '{}' drives {} skinned target(s)",
            self.entities[id].name,
            targets.len()
        );

        if let Some(slot) = self.entities.get_mut(id).and_then(|e| e.animator.as_mut()) {
            slot.targets = targets;
            slot.resolved_generation = Some(generation);
        }
    }

    /// Re-resolve every animator's targets after a hierarchy change
    ///
    /// Renderers no animator reaches anymore fall back to standalone
    /// playback.
    fn refresh_bindings(&mut self, animated: &[EntityId]) {
        if self.bindings_generation == Some(self.generation) {
            return;
        }
        for (_, entity) in &mut self.entities {
            if let Some(skinned) = entity.skinned.as_mut() {
                skinned.set_driven_by_animator(false);
            }
            if let Some(slot) = entity.animator.as_mut() {
                slot.resolved_generation = None;
            }
        }
        for &id in animated {
            self.refresh_targets(id);
        }
        self.bindings_generation = Some(self.generation);
    }

    /// Advance every animator, then every standalone skinned renderer
    pub fn update(&mut self, ctx: &FrameContext) {
        let mut animated = std::mem::take(&mut self.animated);
        animated.clear();
        animated.extend(
            self.entities
                .iter()
                .filter(|(_, entity)| entity.animator.is_some())
                .map(|(id, _)| id),
        );
        self.refresh_bindings(&animated);
        for &id in &animated {
            self.update_animator(ctx, id);
        }
        self.animated = animated;

        for (_, entity) in &mut self.entities {
            let Entity {
                transform, skinned, ..
            } = entity;
            if let Some(skinned) = skinned {
                skinned.update(ctx, transform);
            }
        }
    }

    /// Update the animator on `id` and push its matrices to its targets
    ///
    /// Returns `false` when the entity has no animator or no target with a
    /// skeleton.
    pub fn update_animator(&mut self, ctx: &FrameContext, id: EntityId) -> bool {
        self.refresh_targets(id);
        let parent_world = self.parent_world(id);

        let Some(mut slot) = self.entities.get_mut(id).and_then(|e| e.animator.take()) else {
            return false;
        };

        let primary = slot.targets.iter().copied().find(|&target| {
            self.entities
                .get(target)
                .and_then(|e| e.skinned.as_ref())
                .is_some_and(|skinned| skinned.skeleton().is_some())
        });

        let updated = match primary {
            None => false,
            Some(primary) if primary == id => {
                let entity = &mut self.entities[id];
                let Entity {
                    transform,
                    skinned,
                    ik,
                    ..
                } = entity;
                match skinned.as_ref().and_then(SkinnedMeshRenderer::rig) {
                    Some(rig) => slot.animator.update(
                        ctx,
                        &rig,
                        AnimatorOwner::new(transform)
                            .with_parent_world(parent_world)
                            .with_ik(ik.as_ref()),
                    ),
                    None => false,
                }
            }
            Some(primary) => match self.entities.get_disjoint_mut([id, primary]) {
                Some([owner, target]) => {
                    match target.skinned.as_ref().and_then(SkinnedMeshRenderer::rig) {
                        Some(rig) => slot.animator.update(
                            ctx,
                            &rig,
                            AnimatorOwner::new(&mut owner.transform)
                                .with_parent_world(parent_world)
                                .with_ik(owner.ik.as_ref()),
                        ),
                        None => false,
                    }
                }
                None => false,
            },
        };

        if updated {
            for &target in &slot.targets {
                if let Some(skinned) = self.entities.get_mut(target).and_then(|e| e.skinned.as_mut()) {
                    skinned.apply_bone_matrices(slot.animator.skin_matrices());
                }
            }
        }

        if let Some(entity) = self.entities.get_mut(id) {
            entity.animator = Some(slot);
        }
        updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_spawn_and_parent() {
        let mut scene = Scene::new();
        let root = scene.spawn("Root");
        let child = scene.spawn_child(root, "Child").expect("spawn child");

        assert_eq!(scene.get(child).and_then(Entity::parent), Some(root));
        assert_eq!(scene.get(root).map(|e| e.children().to_vec()), Some(vec![child]));
        assert_eq!(scene.find_by_name("Child"), Some(child));
    }

    #[test]
    fn test_set_parent_rejects_cycles() {
        let mut scene = Scene::new();
        let a = scene.spawn("A");
        let b = scene.spawn_child(a, "B").expect("spawn child");
        assert!(matches!(
            scene.set_parent(a, Some(b)),
            Err(AnimError::HierarchyCycle { .. })
        ));
        assert!(matches!(
            scene.set_parent(a, Some(a)),
            Err(AnimError::HierarchyCycle { .. })
        ));
    }

    #[test]
    fn test_despawn_subtree() {
        let mut scene = Scene::new();
        let a = scene.spawn("A");
        let b = scene.spawn_child(a, "B").expect("spawn child");
        let c = scene.spawn_child(b, "C").expect("spawn child");
        let other = scene.spawn("Other");

        scene.despawn(b).expect("despawn");
        assert!(!scene.contains(b));
        assert!(!scene.contains(c));
        assert!(scene.contains(other));
        assert!(scene.get(a).is_some_and(|e| e.children().is_empty()));
        assert_eq!(scene.despawn(b), Err(AnimError::UnknownEntity));
    }

    #[test]
    fn test_world_matrix_composes_parents() {
        let mut scene = Scene::new();
        let a = scene.spawn("A");
        let b = scene.spawn_child(a, "B").expect("spawn child");
        scene.get_mut(a).expect("a").transform = Transform::from_position(Vec3::X);
        scene.get_mut(b).expect("b").transform = Transform::from_position(Vec3::Y);

        let origin = scene.world_matrix(b).transform_point3(Vec3::ZERO);
        assert!((origin - Vec3::new(1.0, 1.0, 0.0)).length() < 0.0001);
    }

    #[test]
    fn test_target_walk_stops_at_nested_animator() {
        let mut scene = Scene::new();
        let owner = scene.spawn("Owner");
        let body = scene.spawn_child(owner, "Body").expect("spawn");
        let weapon = scene.spawn_child(owner, "Weapon").expect("spawn");
        let pet = scene.spawn_child(owner, "Pet").expect("spawn");
        let pet_mesh = scene.spawn_child(pet, "PetMesh").expect("spawn");

        for id in [owner, body, weapon, pet_mesh] {
            scene.set_skinned(id, Some(SkinnedMeshRenderer::default())).expect("skinned");
        }
        scene.set_animator(owner, Some(Animator::new())).expect("animator");
        scene.set_animator(pet, Some(Animator::new())).expect("animator");

        assert_eq!(scene.skinned_targets(owner).to_vec(), vec![owner, body, weapon]);
        assert_eq!(scene.skinned_targets(pet).to_vec(), vec![pet_mesh]);
        assert!(scene.get(body).and_then(Entity::skinned).is_some_and(SkinnedMeshRenderer::is_driven_by_animator));
    }

    #[test]
    fn test_targets_refresh_after_hierarchy_change() {
        let mut scene = Scene::new();
        let owner = scene.spawn("Owner");
        scene.set_animator(owner, Some(Animator::new())).expect("animator");
        assert!(scene.skinned_targets(owner).is_empty());

        let mesh = scene.spawn_child(owner, "Mesh").expect("spawn");
        scene.set_skinned(mesh, Some(SkinnedMeshRenderer::default())).expect("skinned");
        assert_eq!(scene.skinned_targets(owner).to_vec(), vec![mesh]);
    }

    #[test]
    fn test_removed_animator_releases_renderers() {
        let mut scene = Scene::new();
        let owner = scene.spawn("Owner");
        let mesh = scene.spawn_child(owner, "Mesh").expect("spawn");
        scene.set_skinned(mesh, Some(SkinnedMeshRenderer::default())).expect("skinned");
        scene.set_animator(owner, Some(Animator::new())).expect("animator");

        let ctx = FrameContext::new(0.016);
        scene.update(&ctx);
        assert!(scene.get(mesh).and_then(Entity::skinned).is_some_and(SkinnedMeshRenderer::is_driven_by_animator));

        scene.set_animator(owner, None).expect("animator");
        scene.update(&ctx);
        assert!(!scene.get(mesh).and_then(Entity::skinned).is_some_and(SkinnedMeshRenderer::is_driven_by_animator));
    }
}
