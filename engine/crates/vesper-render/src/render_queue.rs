use std::cell::RefCell;
use std::rc::Rc;

use glam::Mat4;
use indexmap::IndexMap;
use vesper_graphics::basic::graphics_func::GeometryVertex;
use vesper_graphics::basic::graphics_type::{
    MemoryProperty, VertexAttribute, VertexBinding, VertexFormat, VertexInputLayoutDesc, VertexInputRate,
};
use vesper_graphics::interface::buffer::VertexBuffer;
use vesper_graphics::interface::context::GraphicsContext;
use vesper_graphics::interface::shader_resources::ShaderResources;
use vesper_graphics::resources_pool::GraphicsResourcesPool;
use vesper_graphics::{GraphicsError, GraphicsResult};

use crate::material::{MATERIAL_SET, Material, MaterialId};
use crate::mesh::{Mesh, MeshId, MeshSegment};

/// 蒙皮资源（骨骼矩阵的 structured buffer）绑定在 set 1
pub const SKELETON_SET: u32 = 1;

/// 每个 instance 的数据，作为 per-instance 顶点输入
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InstanceData {
    pub model: [[f32; 4]; 4],
}

impl InstanceData {
    pub const STRIDE: u32 = size_of::<InstanceData>() as u32;
    /// mesh 的顶点在 binding 0，instance 数据在 binding 1
    pub const BINDING: u32 = 1;
    /// model 矩阵的 4 列占用 location 3..=6
    pub const FIRST_LOCATION: u32 = 3;

    #[inline]
    pub fn new(model: Mat4) -> Self {
        Self {
            model: model.to_cols_array_2d(),
        }
    }

    /// GeometryVertex 加上 per-instance 的 model 矩阵
    pub fn instanced_vertex_input_layout_desc() -> VertexInputLayoutDesc {
        let mut desc = GeometryVertex::vertex_input_layout_desc();
        desc.bindings.push(VertexBinding {
            binding: Self::BINDING,
            stride: Self::STRIDE,
            input_rate: VertexInputRate::PerInstance,
        });
        desc.attributes.extend((0..4).map(|col| VertexAttribute {
            location: Self::FIRST_LOCATION + col,
            binding: Self::BINDING,
            format: VertexFormat::Float4,
            offset: col * 16,
        }));
        desc
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct BucketKey {
    mesh: MeshId,
    segment: usize,
    /// 蒙皮资源的地址，只用于区分 bucket
    skeleton: Option<usize>,
}

/// 同一 (mesh, segment, skeleton) 的 instance，最终合并为一次 draw
struct Bucket {
    mesh: Rc<Mesh>,
    segment: MeshSegment,
    skeleton: Option<Rc<dyn ShaderResources>>,
    instances: Vec<InstanceData>,
    /// close 之后在 all_instance_datas 中的起始位置
    first_instance: u32,
}

struct Entry {
    material: Rc<Material>,
    buckets: IndexMap<BucketKey, Bucket>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueueState {
    Idle,
    Open,
    Closed,
}

/// instance buffer 槽位，容量不够时重新创建
type InstanceBufferSlot = Rc<RefCell<Option<Rc<dyn VertexBuffer>>>>;

/// 按 material 分组、按 mesh 合并 instance 的绘制队列
///
/// 每帧：`open` -> 若干 `push` -> `close` -> 一次或多次 `render`。
/// entry 按 material 第一次 push 的顺序排列，bucket 按第一次 push 的顺序排列，
/// 同样的 push 序列总是得到同样的 instance 数组。
pub struct RenderQueue {
    state: QueueState,
    entries: IndexMap<MaterialId, Entry>,
    all_instances: Vec<InstanceData>,
    instance_buffers: GraphicsResourcesPool<InstanceBufferSlot>,
}

impl Default for RenderQueue {
    fn default() -> Self {
        Self::new()
    }
}

// new & init
impl RenderQueue {
    pub fn new() -> Self {
        Self {
            state: QueueState::Idle,
            entries: IndexMap::new(),
            all_instances: Vec::new(),
            instance_buffers: GraphicsResourcesPool::new(),
        }
    }
}

// getters
impl RenderQueue {
    /// close 之后所有 instance 的连续数组
    #[inline]
    pub fn all_instance_datas(&self) -> &[InstanceData] {
        &self.all_instances
    }

    #[inline]
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// 也就是 render 会发出的 draw 数量
    pub fn bucket_count(&self) -> usize {
        self.entries.values().map(|e| e.buckets.len()).sum()
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.state == QueueState::Open
    }
}

// tools
impl RenderQueue {
    /// 清空上一帧的内容，开始接收 push
    pub fn open(&mut self) {
        self.entries.clear();
        self.all_instances.clear();
        self.instance_buffers.reset();
        self.state = QueueState::Open;
    }

    pub fn push(&mut self, material: &Rc<Material>, mesh: &Rc<Mesh>, segment: usize, transform: Mat4) -> GraphicsResult<()> {
        self.push_instance(material, mesh, segment, None, transform)
    }

    /// 带蒙皮资源的 push，不同的 skeleton 进入不同的 bucket
    pub fn push_skinned(
        &mut self,
        material: &Rc<Material>,
        mesh: &Rc<Mesh>,
        segment: usize,
        skeleton: &Rc<dyn ShaderResources>,
        transform: Mat4,
    ) -> GraphicsResult<()> {
        self.push_instance(material, mesh, segment, Some(skeleton), transform)
    }

    fn push_instance(
        &mut self,
        material: &Rc<Material>,
        mesh: &Rc<Mesh>,
        segment: usize,
        skeleton: Option<&Rc<dyn ShaderResources>>,
        transform: Mat4,
    ) -> GraphicsResult<()> {
        if self.state != QueueState::Open {
            return Err(GraphicsError::InvalidOperation("push on a render queue that is not open".to_string()));
        }
        let mesh_segment = mesh.segment(segment)?;

        let entry = self.entries.entry(material.id()).or_insert_with(|| Entry {
            material: material.clone(),
            buckets: IndexMap::new(),
        });
        let key = BucketKey {
            mesh: mesh.id(),
            segment,
            skeleton: skeleton.map(|s| Rc::as_ptr(s) as *const () as usize),
        };
        let bucket = entry.buckets.entry(key).or_insert_with(|| Bucket {
            mesh: mesh.clone(),
            segment: mesh_segment,
            skeleton: skeleton.cloned(),
            instances: Vec::new(),
            first_instance: 0,
        });
        bucket.instances.push(InstanceData::new(transform));
        Ok(())
    }

    /// 把所有 bucket 依次展开到一个数组中
    pub fn close(&mut self) -> GraphicsResult<()> {
        if self.state != QueueState::Open {
            return Err(GraphicsError::InvalidOperation("close on a render queue that is not open".to_string()));
        }
        self.all_instances.clear();
        for bucket in self.entries.values_mut().flat_map(|e| e.buckets.values_mut()) {
            bucket.first_instance = self.all_instances.len() as u32;
            self.all_instances.extend_from_slice(&bucket.instances);
        }
        self.state = QueueState::Closed;
        log::debug!(
            "render queue closed: {} entries, {} buckets, {} instances",
            self.entries.len(),
            self.bucket_count(),
            self.all_instances.len()
        );
        Ok(())
    }

    /// 上传 instance 数据，每个 bucket 发出一次 instanced draw
    ///
    /// 必须在 prepare 与 present 之间调用，绘制到当前的 framebuffer
    pub fn render(&mut self, ctx: &mut dyn GraphicsContext) -> GraphicsResult<()> {
        let _span = tracy_client::span!("RenderQueue::render");
        if self.state != QueueState::Closed {
            return Err(GraphicsError::InvalidOperation("render before close".to_string()));
        }
        if self.all_instances.is_empty() {
            return Ok(());
        }

        let instance_buffer = self.upload_instances(ctx)?;
        let queue = ctx.command_queue();
        for entry in self.entries.values() {
            queue.set_pipeline(entry.material.pipeline().clone());
            // 每次 draw 只绑定它自己需要的 set，上一个 material / bucket 的绑定不能残留
            match entry.material.shader_resources() {
                Some(resources) => queue.set_shader_resources(MATERIAL_SET, resources.clone()),
                None => queue.clear_shader_resources(MATERIAL_SET),
            }

            for bucket in entry.buckets.values() {
                match &bucket.skeleton {
                    Some(skeleton) => queue.set_shader_resources(SKELETON_SET, skeleton.clone()),
                    None => queue.clear_shader_resources(SKELETON_SET),
                }
                queue.set_vertex_buffer(0, bucket.mesh.vertex_buffer().clone());
                queue.set_vertex_buffer(InstanceData::BINDING, instance_buffer.clone());
                queue.set_index_buffer(bucket.mesh.index_buffer().clone());
                queue.draw_indexed(
                    bucket.segment.index_count,
                    bucket.instances.len() as u32,
                    bucket.segment.first_index,
                    bucket.segment.vertex_offset,
                    bucket.first_instance,
                )?;
            }
        }
        Ok(())
    }

    /// 从当前帧的资源池中取一个 instance buffer，容量不够时按 2 的幂扩容
    fn upload_instances(&mut self, ctx: &dyn GraphicsContext) -> GraphicsResult<Rc<dyn VertexBuffer>> {
        let slot = self.instance_buffers.get_current(ctx, |_| Ok(Rc::new(RefCell::new(None))))?;
        let count = self.all_instances.len() as u32;

        let buffer = {
            let mut slot = slot.borrow_mut();
            match slot.as_ref() {
                Some(buffer) if buffer.element_count() >= count => buffer.clone(),
                _ => {
                    let capacity = count.next_power_of_two();
                    let buffer = ctx.create_vertex_buffer(MemoryProperty::Dynamic, InstanceData::STRIDE, capacity, None)?;
                    log::debug!("instance buffer grows to {capacity}");
                    *slot = Some(buffer.clone());
                    buffer
                }
            }
        };
        buffer.update(0, bytemuck::cast_slice(&self.all_instances))?;
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use vesper_graphics::config::GraphicsConfig;
    use vesper_graphics::interface::pipeline::GraphicsPipeline;
    use vesper_graphics::interface::platform::HeadlessPlatform;
    use vesper_graphics::null::NullContext;
    use vesper_graphics::null::command_queue::NullCommand;

    fn context() -> NullContext {
        NullContext::new(&GraphicsConfig::default(), &HeadlessPlatform::new(64, 64)).unwrap()
    }

    fn pipeline(ctx: &NullContext) -> Rc<dyn GraphicsPipeline> {
        let pipeline = ctx.create_graphics_pipeline().unwrap();
        pipeline.set_shader(ctx.create_graphics_shader(&[1; 4], &[2; 4]).unwrap());
        pipeline.set_vertex_input_layout(
            ctx.create_vertex_input_layout(&InstanceData::instanced_vertex_input_layout_desc()).unwrap(),
        );
        pipeline
    }

    fn material(ctx: &NullContext, name: &str) -> Rc<Material> {
        Rc::new(Material::new(name, pipeline(ctx)))
    }

    fn at(x: f32) -> Mat4 {
        Mat4::from_translation(Vec3::new(x, 0.0, 0.0))
    }

    /// (material, mesh, x) 的 push 序列
    fn fill(queue: &mut RenderQueue, pushes: &[(&Rc<Material>, &Rc<Mesh>, f32)]) {
        queue.open();
        for (material, mesh, x) in pushes {
            queue.push(material, mesh, 0, at(*x)).unwrap();
        }
        queue.close().unwrap();
    }

    #[test]
    fn test_instance_layout() {
        let desc = InstanceData::instanced_vertex_input_layout_desc();
        assert_eq!(desc.bindings.len(), 2);
        assert_eq!(desc.bindings[1].input_rate, VertexInputRate::PerInstance);
        assert_eq!(desc.attributes.len(), 7);
        assert_eq!(desc.attributes.last().map(|a| (a.location, a.offset)), Some((6, 48)));
        assert_eq!(InstanceData::STRIDE, 64);
    }

    #[test]
    fn test_close_orders_by_entry_then_bucket() {
        let ctx = context();
        let (red, blue) = (material(&ctx, "red"), material(&ctx, "blue"));
        let cube = Rc::new(Mesh::cube(&ctx).unwrap());
        let quad = Rc::new(Mesh::quad(&ctx).unwrap());

        let mut queue = RenderQueue::new();
        fill(
            &mut queue,
            &[(&red, &cube, 1.0), (&blue, &quad, 2.0), (&red, &quad, 3.0), (&red, &cube, 4.0), (&blue, &quad, 5.0)],
        );

        assert_eq!(queue.entry_count(), 2);
        assert_eq!(queue.bucket_count(), 3);
        let xs: Vec<f32> = queue.all_instance_datas().iter().map(|d| d.model[3][0]).collect();
        // red: cube(1, 4), quad(3)；blue: quad(2, 5)
        assert_eq!(xs, vec![1.0, 4.0, 3.0, 2.0, 5.0]);
    }

    #[test]
    fn test_same_pushes_same_bytes() {
        let ctx = context();
        let (a, b) = (material(&ctx, "a"), material(&ctx, "b"));
        let cube = Rc::new(Mesh::cube(&ctx).unwrap());
        let pushes = [(&b, &cube, 0.5), (&a, &cube, 1.5), (&b, &cube, 2.5)];

        let mut queue = RenderQueue::new();
        fill(&mut queue, &pushes);
        let first: Vec<u8> = bytemuck::cast_slice(queue.all_instance_datas()).to_vec();
        fill(&mut queue, &pushes);
        let second: &[u8] = bytemuck::cast_slice(queue.all_instance_datas());

        assert_eq!(first.as_slice(), second);
        assert_eq!(queue.all_instance_datas().len(), pushes.len());
    }

    #[test]
    fn test_push_requires_open() {
        let ctx = context();
        let red = material(&ctx, "red");
        let cube = Rc::new(Mesh::cube(&ctx).unwrap());

        let mut queue = RenderQueue::new();
        assert!(queue.push(&red, &cube, 0, Mat4::IDENTITY).is_err());
        assert!(queue.close().is_err());

        queue.open();
        assert!(queue.push(&red, &cube, 1, Mat4::IDENTITY).is_err());
        queue.close().unwrap();
        assert!(queue.push(&red, &cube, 0, Mat4::IDENTITY).is_err());
    }

    #[test]
    fn test_skeleton_splits_buckets() {
        let ctx = context();
        let red = material(&ctx, "red");
        let cube = Rc::new(Mesh::cube(&ctx).unwrap());
        let layout = ctx.create_shader_resources_layout(&[]).unwrap();
        let skeleton = ctx.create_shader_resources(layout).unwrap();

        let mut queue = RenderQueue::new();
        queue.open();
        queue.push(&red, &cube, 0, at(0.0)).unwrap();
        queue.push_skinned(&red, &cube, 0, &skeleton, at(1.0)).unwrap();
        queue.push_skinned(&red, &cube, 0, &skeleton, at(2.0)).unwrap();
        queue.close().unwrap();

        assert_eq!(queue.entry_count(), 1);
        assert_eq!(queue.bucket_count(), 2);
    }

    #[test]
    fn test_render_one_draw_per_bucket() {
        let mut ctx = context();
        let red = material(&ctx, "red");
        let cube = Rc::new(Mesh::cube(&ctx).unwrap());
        let quad = Rc::new(Mesh::quad(&ctx).unwrap());

        let mut queue = RenderQueue::new();
        assert!(queue.render(&mut ctx).is_err());
        fill(&mut queue, &[(&red, &cube, 0.0), (&red, &quad, 1.0), (&red, &cube, 2.0)]);

        assert!(ctx.prepare().unwrap());
        queue.render(&mut ctx).unwrap();
        ctx.present().unwrap();

        let draws: Vec<_> = ctx
            .null_command_queue()
            .commands()
            .iter()
            .filter_map(|c| match c {
                NullCommand::DrawIndexed {
                    index_count,
                    instance_count,
                    first_instance,
                    ..
                } => Some((*index_count, *instance_count, *first_instance)),
                _ => None,
            })
            .collect();
        assert_eq!(draws, vec![(36, 2, 0), (6, 1, 2)]);
    }

    #[test]
    fn test_instance_buffers_reused_across_frames() {
        let mut ctx = context();
        let red = material(&ctx, "red");
        let cube = Rc::new(Mesh::cube(&ctx).unwrap());
        let mut queue = RenderQueue::new();

        for _ in 0..4 {
            fill(&mut queue, &[(&red, &cube, 0.0), (&red, &cube, 1.0)]);
            assert!(ctx.prepare().unwrap());
            queue.render(&mut ctx).unwrap();
            ctx.present().unwrap();
        }
        for frame in 0..ctx.frame_count() {
            assert_eq!(queue.instance_buffers.capacity(frame), 1);
        }
    }

    #[test]
    fn test_draws_bind_only_their_own_sets() {
        let mut ctx = context();
        let layout = ctx.create_shader_resources_layout(&[]).unwrap();
        let textures = ctx.create_shader_resources(layout.clone()).unwrap();
        let skeleton = ctx.create_shader_resources(layout).unwrap();
        let skinned = Rc::new(Material::new("skinned", pipeline(&ctx)).with_shader_resources(textures));
        let plain = material(&ctx, "plain");
        let cube = Rc::new(Mesh::cube(&ctx).unwrap());

        let mut queue = RenderQueue::new();
        queue.open();
        queue.push_skinned(&skinned, &cube, 0, &skeleton, at(0.0)).unwrap();
        queue.push(&plain, &cube, 0, at(1.0)).unwrap();
        queue.close().unwrap();

        assert!(ctx.prepare().unwrap());
        queue.render(&mut ctx).unwrap();
        ctx.present().unwrap();

        // 按 DrawIndexed 切分，得到每次 draw 之前绑定的 set
        let mut sets_per_draw = vec![Vec::new()];
        for command in ctx.null_command_queue().commands() {
            match command {
                NullCommand::BindShaderResources { set, .. } => sets_per_draw.last_mut().unwrap().push(*set),
                NullCommand::DrawIndexed { .. } => sets_per_draw.push(Vec::new()),
                _ => {}
            }
        }
        assert_eq!(sets_per_draw[0], vec![MATERIAL_SET, SKELETON_SET]);
        assert!(sets_per_draw[1].is_empty());
    }
}
