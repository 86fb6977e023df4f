//! Instanced draw batches
//!
//! Batches nest material → mesh → animation. A `MaterialBatch` gathers every
//! instance whose material is mergable-equal, a `MeshBatch` every instance of
//! one mesh entry under that material, and an `AnimationBatch` the animated
//! instances posed at the same clip frame.

use crate::graphics::descriptor::{identity, AnimationClip};
use crate::graphics::entry::{EntryId, MaterialEntry, MeshEntry};
use crate::graphics::material::MaterialKey;
use glam::{Mat4, Vec3};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Animation clip and frame, compared by clip identity
#[derive(Debug, Clone)]
pub struct AnimationKey {
    clip: Arc<AnimationClip>,
    frame: u32,
}

impl AnimationKey {
    pub fn new(clip: Arc<AnimationClip>, frame: u32) -> Self {
        Self { clip, frame }
    }

    pub fn clip(&self) -> &Arc<AnimationClip> {
        &self.clip
    }

    pub fn frame(&self) -> u32 {
        self.frame
    }
}

impl PartialEq for AnimationKey {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.clip, &other.clip) && self.frame == other.frame
    }
}

impl Eq for AnimationKey {}

impl Hash for AnimationKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        identity(&self.clip).hash(state);
        self.frame.hash(state);
    }
}

/// Instances of one mesh posed at one animation frame
#[derive(Debug, Clone)]
pub struct AnimationBatch {
    pub key: AnimationKey,
    pub matrices: Vec<Mat4>,
}

/// Instances sharing one mesh entry under one material batch
#[derive(Debug, Clone)]
pub struct MeshBatch {
    mesh: Arc<MeshEntry>,
    matrices: Vec<Mat4>,
    animations: Vec<AnimationBatch>,
    animation_index: HashMap<AnimationKey, usize>,
    depth: f32,
}

impl MeshBatch {
    pub fn new(mesh: Arc<MeshEntry>) -> Self {
        Self {
            mesh,
            matrices: Vec::new(),
            animations: Vec::new(),
            animation_index: HashMap::new(),
            depth: 0.0,
        }
    }

    pub fn mesh(&self) -> &Arc<MeshEntry> {
        &self.mesh
    }

    /// Unanimated instance transforms
    pub fn matrices(&self) -> &[Mat4] {
        &self.matrices
    }

    pub fn animations(&self) -> &[AnimationBatch] {
        &self.animations
    }

    pub fn push(&mut self, matrix: Mat4, animation: Option<AnimationKey>) {
        let Some(key) = animation else {
            self.matrices.push(matrix);
            return;
        };
        let index = match self.animation_index.get(&key) {
            Some(&index) => index,
            None => {
                self.animations.push(AnimationBatch {
                    key: key.clone(),
                    matrices: Vec::new(),
                });
                self.animation_index.insert(key, self.animations.len() - 1);
                self.animations.len() - 1
            }
        };
        self.animations[index].matrices.push(matrix);
    }

    pub fn instance_count(&self) -> usize {
        self.matrices.len()
            + self
                .animations
                .iter()
                .map(|batch| batch.matrices.len())
                .sum::<usize>()
    }

    /// Number of draw calls this batch issues
    pub fn draw_count(&self) -> usize {
        usize::from(!self.matrices.is_empty()) + self.animations.len()
    }

    /// Depth of the nearest instance, as computed by the last sort
    pub fn depth(&self) -> f32 {
        self.depth
    }

    fn all_matrices(&self) -> impl Iterator<Item = &Mat4> {
        self.matrices
            .iter()
            .chain(self.animations.iter().flat_map(|batch| batch.matrices.iter()))
    }

    fn update_depth(&mut self, depth_of: &impl Fn(Vec3) -> f32) {
        self.depth = self
            .all_matrices()
            .map(|matrix| depth_of(matrix.w_axis.truncate()))
            .min_by(f32::total_cmp)
            .unwrap_or(0.0);
    }

    fn sort_instances(&mut self, limit: usize, depth_of: &impl Fn(Vec3) -> f32) {
        let matrix_depth = |matrix: &Mat4| depth_of(matrix.w_axis.truncate());
        sort_nearest_back_to_front(&mut self.matrices, limit, matrix_depth);
        for batch in &mut self.animations {
            sort_nearest_back_to_front(&mut batch.matrices, limit, matrix_depth);
        }
    }
}

/// Mesh batches whose materials share one merge key
#[derive(Debug, Clone)]
pub struct MaterialBatch {
    material: Arc<MaterialEntry>,
    meshes: Vec<MeshBatch>,
    mesh_index: HashMap<EntryId, usize>,
}

impl MaterialBatch {
    /// Start a batch drawn with `material`
    ///
    /// Later mergable-equal materials join the batch and draw with this one.
    pub fn new(material: Arc<MaterialEntry>) -> Self {
        Self {
            material,
            meshes: Vec::new(),
            mesh_index: HashMap::new(),
        }
    }

    pub fn material(&self) -> &Arc<MaterialEntry> {
        &self.material
    }

    pub fn meshes(&self) -> &[MeshBatch] {
        &self.meshes
    }

    /// Append an instance; returns `true` if a new mesh batch was started
    pub fn push(
        &mut self,
        mesh: &Arc<MeshEntry>,
        matrix: Mat4,
        animation: Option<AnimationKey>,
    ) -> bool {
        let (index, created) = match self.mesh_index.get(&mesh.id()) {
            Some(&index) => (index, false),
            None => {
                self.meshes.push(MeshBatch::new(Arc::clone(mesh)));
                self.mesh_index.insert(mesh.id(), self.meshes.len() - 1);
                (self.meshes.len() - 1, true)
            }
        };
        self.meshes[index].push(matrix, animation);
        created
    }

    pub fn instance_count(&self) -> usize {
        self.meshes.iter().map(MeshBatch::instance_count).sum()
    }

    /// Order mesh batches and their instances back-to-front
    ///
    /// Only the `max_batches` nearest mesh batches and, inside those, the
    /// `max_instances` nearest instances are sorted. Everything farther is
    /// drawn first, unordered.
    pub fn sort_back_to_front(
        &mut self,
        depth_of: impl Fn(Vec3) -> f32,
        max_batches: usize,
        max_instances: usize,
    ) {
        for batch in &mut self.meshes {
            batch.update_depth(&depth_of);
        }
        let sorted_from = sort_nearest_back_to_front(&mut self.meshes, max_batches, MeshBatch::depth);
        for batch in &mut self.meshes[sorted_from..] {
            batch.sort_instances(max_instances, &depth_of);
        }
        self.mesh_index = self
            .meshes
            .iter()
            .enumerate()
            .map(|(index, batch)| (batch.mesh.id(), index))
            .collect();
    }
}

/// Material batches keyed by merge key, in first-seen order
#[derive(Debug, Clone, Default)]
pub struct BatchSet {
    batches: Vec<MaterialBatch>,
    index: HashMap<MaterialKey, usize>,
}

/// What an append created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Appended {
    pub new_material: bool,
    pub new_mesh: bool,
}

impl BatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &mut self,
        material: &Arc<MaterialEntry>,
        mesh: &Arc<MeshEntry>,
        matrix: Mat4,
        animation: Option<AnimationKey>,
    ) -> Appended {
        let (index, new_material) = match self.index.get(material.merge_key()) {
            Some(&index) => (index, false),
            None => {
                self.batches.push(MaterialBatch::new(Arc::clone(material)));
                self.index
                    .insert(material.merge_key().clone(), self.batches.len() - 1);
                (self.batches.len() - 1, true)
            }
        };
        let new_mesh = self.batches[index].push(mesh, matrix, animation);
        Appended {
            new_material,
            new_mesh,
        }
    }

    pub fn batches(&self) -> &[MaterialBatch] {
        &self.batches
    }

    pub(crate) fn batches_mut(&mut self) -> &mut [MaterialBatch] {
        &mut self.batches
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn mesh_batch_count(&self) -> usize {
        self.batches.iter().map(|batch| batch.meshes.len()).sum()
    }

    pub fn instance_count(&self) -> usize {
        self.batches.iter().map(MaterialBatch::instance_count).sum()
    }
}

/// Move the `limit` nearest items to the end, sorted farthest first
///
/// Items before the returned index are farther than every sorted item and
/// keep no particular order. Larger depth means farther.
pub(crate) fn sort_nearest_back_to_front<T>(
    items: &mut [T],
    limit: usize,
    depth: impl Fn(&T) -> f32,
) -> usize {
    if limit == 0 {
        return items.len();
    }
    let farthest_first = |a: &T, b: &T| -> Ordering { depth(b).total_cmp(&depth(a)) };
    let split = items.len().saturating_sub(limit);
    if split > 0 {
        items.select_nth_unstable_by(split, &farthest_first);
    }
    items[split..].sort_by(&farthest_first);
    split
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::material::MaterialDescriptor;
    use crate::graphics::mesh::MeshDescriptor;

    fn mesh(name: &str) -> Arc<MeshEntry> {
        Arc::new(MeshEntry::create(&Arc::new(MeshDescriptor::cube(name, 1.0))).unwrap())
    }

    fn material(name: &str, color: [f32; 4]) -> Arc<MaterialEntry> {
        Arc::new(MaterialEntry::create(&Arc::new(MaterialDescriptor::new(name, color)), None).unwrap())
    }

    fn at(z: f32) -> Mat4 {
        Mat4::from_translation(Vec3::new(0.0, 0.0, z))
    }

    #[test]
    fn test_same_pair_collapses_into_one_mesh_batch() {
        let mut set = BatchSet::new();
        let cube = mesh("cube");
        let red = material("red", [1.0, 0.0, 0.0, 1.0]);

        let first = set.push(&red, &cube, at(1.0), None);
        assert!(first.new_material && first.new_mesh);
        for z in 2..6 {
            assert_eq!(set.push(&red, &cube, at(z as f32), None), Appended::default());
        }

        assert_eq!(set.len(), 1);
        assert_eq!(set.mesh_batch_count(), 1);
        assert_eq!(set.batches()[0].meshes()[0].matrices().len(), 5);
    }

    #[test]
    fn test_mergable_materials_share_batch() {
        let mut set = BatchSet::new();
        let cube = mesh("cube");
        let a = material("red_a", [1.0, 0.0, 0.0, 1.0]);
        let b = material("red_b", [1.0, 0.0, 0.0, 1.0]);
        let blue = material("blue", [0.0, 0.0, 1.0, 1.0]);

        set.push(&a, &cube, at(0.0), None);
        set.push(&b, &cube, at(1.0), None);
        set.push(&blue, &cube, at(2.0), None);

        assert_eq!(set.len(), 2);
        assert!(Arc::ptr_eq(set.batches()[0].material(), &a));
        assert_eq!(set.batches()[0].instance_count(), 2);
    }

    #[test]
    fn test_animation_frames_split_mesh_batch() {
        let mut batch = MeshBatch::new(mesh("walker"));
        let walk = Arc::new(AnimationClip::new("walk", 30));
        let other_walk = Arc::new(AnimationClip::new("walk", 30));

        batch.push(at(0.0), None);
        batch.push(at(1.0), Some(AnimationKey::new(Arc::clone(&walk), 3)));
        batch.push(at(2.0), Some(AnimationKey::new(Arc::clone(&walk), 3)));
        batch.push(at(3.0), Some(AnimationKey::new(Arc::clone(&walk), 4)));
        batch.push(at(4.0), Some(AnimationKey::new(other_walk, 3)));

        assert_eq!(batch.instance_count(), 5);
        assert_eq!(batch.animations().len(), 3);
        assert_eq!(batch.animations()[0].matrices.len(), 2);
        assert_eq!(batch.draw_count(), 4);
    }

    #[test]
    fn test_sort_nearest_back_to_front() {
        let mut depths = vec![1.0, 5.0, 3.0];
        let split = sort_nearest_back_to_front(&mut depths, 10, |d| *d);
        assert_eq!(split, 0);
        assert_eq!(depths, vec![5.0, 3.0, 1.0]);
    }

    #[test]
    fn test_sort_limit_keeps_far_items_first() {
        let mut depths = vec![9.0, 1.0, 7.0, 2.0, 8.0, 3.0];
        let split = sort_nearest_back_to_front(&mut depths, 3, |d| *d);
        assert_eq!(split, 3);
        assert_eq!(&depths[3..], &[3.0, 2.0, 1.0]);
        assert!(depths[..3].iter().all(|d| *d >= 7.0));
    }

    #[test]
    fn test_material_batch_sorts_mesh_batches_by_nearest_instance() {
        let near = mesh("near");
        let far = mesh("far");
        let glass = material("glass", [1.0, 1.0, 1.0, 0.5]);
        let mut batch = MaterialBatch::new(Arc::clone(&glass));
        batch.push(&near, at(-1.0), None);
        batch.push(&far, at(-8.0), None);
        batch.push(&near, at(-20.0), None);

        batch.sort_back_to_front(|p| p.length_squared(), 10, 10);

        assert_eq!(batch.meshes()[0].mesh().id(), far.id());
        assert_eq!(batch.meshes()[1].matrices()[0], at(-20.0));
        assert_eq!(batch.meshes()[1].matrices()[1], at(-1.0));

        // Index stays valid after reordering
        assert!(!batch.push(&far, at(-2.0), None));
        assert_eq!(batch.meshes()[0].matrices().len(), 2);
    }
}
