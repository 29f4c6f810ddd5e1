//! Scene graph and hierarchical scene organization.
//!
//! Provides the [`SceneNode`] trait and the two node kinds produced by the glTF
//! loader: [`ContainerNode`] for transform-only nodes and [`ModelNode`] for
//! nodes that own geometry. [`Scene`] is the root container created once at
//! startup.

use wgpu::util::DeviceExt;

use crate::{
    config::Rgb,
    data_structures::{instance::Instance, model},
    render::{Instanced, Render},
};

pub trait SceneNode {
    fn get_local_transform(&self) -> Instance;

    fn set_local_transform(&mut self, instance: Instance);

    fn get_world_transform(&self) -> Instance;

    /// Recompute this node's world transform from its parent's and recurse.
    fn update_world_transforms(&mut self, parent: &Instance);

    fn get_children(&self) -> &Vec<Box<dyn SceneNode>>;

    fn get_children_mut(&mut self) -> &mut Vec<Box<dyn SceneNode>>;

    fn add_child(&mut self, child: Box<dyn SceneNode>);

    /// Set the shadow flags of this node only. See [`enable_shadows`] for the
    /// recursive variant.
    fn set_shadows(&mut self, cast: bool, receive: bool);

    fn casts_shadow(&self) -> bool;

    fn receives_shadow(&self) -> bool;

    fn is_mesh(&self) -> bool;

    fn write_to_buffers(&mut self, queue: &wgpu::Queue);

    fn get_render(&self) -> Vec<Instanced<'_>>;
}

/// Visit `node` and every descendant depth-first.
pub fn traverse_mut(node: &mut dyn SceneNode, visit: &mut dyn FnMut(&mut dyn SceneNode)) {
    visit(node);
    for child in node.get_children_mut().iter_mut() {
        traverse_mut(child.as_mut(), visit);
    }
}

/// Mark the root and every mesh below it as casting and receiving shadows.
///
/// Returns the number of meshes that were flagged.
pub fn enable_shadows(root: &mut dyn SceneNode) -> usize {
    root.set_shadows(true, true);
    let mut meshes = 0;
    traverse_mut(root, &mut |node| {
        if node.is_mesh() {
            node.set_shadows(true, true);
            meshes += 1;
        }
    });
    meshes
}

pub struct ContainerNode {
    pub children: Vec<Box<dyn SceneNode>>,
    local: Instance,
    world: Instance,
    cast_shadow: bool,
    receive_shadow: bool,
}

impl ContainerNode {
    pub fn new() -> Self {
        Self {
            children: Vec::new(),
            local: Instance::default(),
            world: Instance::default(),
            cast_shadow: false,
            receive_shadow: false,
        }
    }
}

impl Default for ContainerNode {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneNode for ContainerNode {
    fn get_local_transform(&self) -> Instance {
        self.local
    }

    fn set_local_transform(&mut self, instance: Instance) {
        self.local = instance;
    }

    fn get_world_transform(&self) -> Instance {
        self.world
    }

    fn update_world_transforms(&mut self, parent: &Instance) {
        self.world = parent * &self.local;
        let world = self.world;
        for child in self.children.iter_mut() {
            child.update_world_transforms(&world);
        }
    }

    fn get_children(&self) -> &Vec<Box<dyn SceneNode>> {
        &self.children
    }

    fn get_children_mut(&mut self) -> &mut Vec<Box<dyn SceneNode>> {
        &mut self.children
    }

    fn add_child(&mut self, child: Box<dyn SceneNode>) {
        self.children.push(child);
    }

    fn set_shadows(&mut self, cast: bool, receive: bool) {
        self.cast_shadow = cast;
        self.receive_shadow = receive;
    }

    fn casts_shadow(&self) -> bool {
        self.cast_shadow
    }

    fn receives_shadow(&self) -> bool {
        self.receive_shadow
    }

    fn is_mesh(&self) -> bool {
        false
    }

    fn write_to_buffers(&mut self, queue: &wgpu::Queue) {
        self.children
            .iter_mut()
            .for_each(|child| child.write_to_buffers(queue));
    }

    fn get_render(&self) -> Vec<Instanced<'_>> {
        self.children
            .iter()
            .flat_map(|child| child.get_render())
            .collect()
    }
}

pub struct ModelNode {
    children: Vec<Box<dyn SceneNode>>,
    instance_buffer: wgpu::Buffer,
    local: Instance,
    world: Instance,
    model: model::Model,
    cast_shadow: bool,
    receive_shadow: bool,
}

impl ModelNode {
    pub fn from_model(device: &wgpu::Device, model: model::Model) -> Self {
        let world = Instance::default();
        let instance_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Instance Buffer"),
            contents: bytemuck::cast_slice(&[world.to_raw(false)]),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });

        Self {
            children: vec![],
            instance_buffer,
            local: Instance::default(),
            world,
            model,
            cast_shadow: false,
            receive_shadow: false,
        }
    }
}

impl SceneNode for ModelNode {
    fn get_local_transform(&self) -> Instance {
        self.local
    }

    fn set_local_transform(&mut self, instance: Instance) {
        self.local = instance;
    }

    fn get_world_transform(&self) -> Instance {
        self.world
    }

    fn update_world_transforms(&mut self, parent: &Instance) {
        self.world = parent * &self.local;
        let world = self.world;
        for child in self.children.iter_mut() {
            child.update_world_transforms(&world);
        }
    }

    fn get_children(&self) -> &Vec<Box<dyn SceneNode>> {
        &self.children
    }

    fn get_children_mut(&mut self) -> &mut Vec<Box<dyn SceneNode>> {
        &mut self.children
    }

    fn add_child(&mut self, child: Box<dyn SceneNode>) {
        self.children.push(child);
    }

    fn set_shadows(&mut self, cast: bool, receive: bool) {
        self.cast_shadow = cast;
        self.receive_shadow = receive;
    }

    fn casts_shadow(&self) -> bool {
        self.cast_shadow
    }

    fn receives_shadow(&self) -> bool {
        self.receive_shadow
    }

    fn is_mesh(&self) -> bool {
        true
    }

    fn write_to_buffers(&mut self, queue: &wgpu::Queue) {
        queue.write_buffer(
            &self.instance_buffer,
            0,
            bytemuck::cast_slice(&[self.world.to_raw(self.receive_shadow)]),
        );
        self.children
            .iter_mut()
            .for_each(|child| child.write_to_buffers(queue));
    }

    fn get_render(&self) -> Vec<Instanced<'_>> {
        self.children
            .iter()
            .flat_map(|child| child.get_render())
            .chain([Instanced {
                instance: &self.instance_buffer,
                model: &self.model,
                amount: 1,
                cast_shadow: self.cast_shadow,
            }])
            .collect()
    }
}

/// The root of everything the viewer draws.
///
/// Nodes are only ever added; the scene lives as long as the application.
pub struct Scene {
    pub background: Rgb,
    nodes: Vec<Box<dyn SceneNode>>,
}

impl Scene {
    pub fn new(background: Rgb) -> Self {
        Self {
            background,
            nodes: Vec::new(),
        }
    }

    /// Attach a node, placing it (and its subtree) in world space.
    pub fn add(&mut self, mut node: Box<dyn SceneNode>) {
        node.update_world_transforms(&Instance::default());
        self.nodes.push(node);
    }

    pub fn nodes(&self) -> &[Box<dyn SceneNode>] {
        &self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn write_to_buffers(&mut self, queue: &wgpu::Queue) {
        if self.nodes.is_empty() {
            return;
        }
        self.nodes
            .iter_mut()
            .for_each(|node| node.write_to_buffers(queue));
    }

    pub fn get_render(&self) -> Render<'_> {
        let instanced: Vec<_> = self.nodes.iter().flat_map(|n| n.get_render()).collect();
        if instanced.is_empty() {
            return Render::None;
        }
        Render::Defaults(instanced)
    }
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("background", &self.background)
            .field("nodes", &self.nodes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use cgmath::Vector3;

    use super::*;

    fn tree() -> ContainerNode {
        let mut root = ContainerNode::new();
        let mut branch = ContainerNode::new();
        branch.add_child(Box::new(ContainerNode::new()));
        root.add_child(Box::new(branch));
        root.add_child(Box::new(ContainerNode::new()));
        root
    }

    #[test]
    fn traversal_visits_every_node() {
        let mut root = tree();
        let mut visited = 0;
        traverse_mut(&mut root, &mut |_| visited += 1);
        assert_eq!(visited, 4);
    }

    /// Geometry-less stand-in for a model node.
    #[derive(Default)]
    struct Mesh {
        children: Vec<Box<dyn SceneNode>>,
        shadows: (bool, bool),
    }

    impl SceneNode for Mesh {
        fn get_local_transform(&self) -> Instance {
            Instance::default()
        }

        fn set_local_transform(&mut self, _: Instance) {}

        fn get_world_transform(&self) -> Instance {
            Instance::default()
        }

        fn update_world_transforms(&mut self, _: &Instance) {}

        fn get_children(&self) -> &Vec<Box<dyn SceneNode>> {
            &self.children
        }

        fn get_children_mut(&mut self) -> &mut Vec<Box<dyn SceneNode>> {
            &mut self.children
        }

        fn add_child(&mut self, child: Box<dyn SceneNode>) {
            self.children.push(child);
        }

        fn set_shadows(&mut self, cast: bool, receive: bool) {
            self.shadows = (cast, receive);
        }

        fn casts_shadow(&self) -> bool {
            self.shadows.0
        }

        fn receives_shadow(&self) -> bool {
            self.shadows.1
        }

        fn is_mesh(&self) -> bool {
            true
        }

        fn write_to_buffers(&mut self, _: &wgpu::Queue) {}

        fn get_render(&self) -> Vec<Instanced<'_>> {
            Vec::new()
        }
    }

    #[test]
    fn enabling_shadows_reaches_nested_meshes() {
        // root -> branch -> mesh -> mesh, plus a mesh directly below the root
        let mut outer = Mesh::default();
        outer.add_child(Box::new(Mesh::default()));
        let mut branch = ContainerNode::new();
        branch.add_child(Box::new(outer));
        let mut root = ContainerNode::new();
        root.add_child(Box::new(branch));
        root.add_child(Box::new(Mesh::default()));

        assert_eq!(enable_shadows(&mut root), 3);

        let branch = &root.children[0];
        assert!(!branch.casts_shadow());
        let outer = &branch.get_children()[0];
        let inner = &outer.get_children()[0];
        for mesh in [outer, inner, &root.children[1]] {
            assert!(mesh.casts_shadow());
            assert!(mesh.receives_shadow());
        }
    }

    #[test]
    fn enabling_shadows_flags_the_root() {
        let mut root = tree();
        let meshes = enable_shadows(&mut root);
        // containers carry no geometry
        assert_eq!(meshes, 0);
        assert!(root.casts_shadow());
        assert!(root.receives_shadow());
        assert!(!root.children[0].casts_shadow());
    }

    #[test]
    fn world_transforms_accumulate_down_the_tree() {
        let mut root = ContainerNode::new();
        root.set_local_transform(Vector3::new(0.0, 1.0, 0.0).into());
        let mut child = ContainerNode::new();
        child.set_local_transform(Vector3::new(2.0, 0.0, 0.0).into());
        root.add_child(Box::new(child));

        root.update_world_transforms(&Instance::default());

        let world = root.children[0].get_world_transform();
        assert_eq!(world.position, Vector3::new(2.0, 1.0, 0.0));
    }

    #[test]
    fn empty_scene_renders_nothing() {
        let scene = Scene::new(Rgb::new(0.0, 0.0, 0.0));
        assert!(scene.is_empty());
        assert!(matches!(scene.get_render(), Render::None));
    }
}
