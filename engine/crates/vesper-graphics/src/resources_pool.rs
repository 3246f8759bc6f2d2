use crate::basic::error::{GraphicsError, GraphicsResult};
use crate::interface::context::GraphicsContext;

/// 按帧复用的资源池
///
/// 每个 frame index 有一组懒创建的资源。`get` 依次分发当前帧的下一个资源，
/// `reset` 在新的一帧开始时把游标拨回 0。
/// 资源只增不减，数量等于单帧内并发请求的最大值。
///
/// 同一个 frame index 的资源只会在该槽位的 fence 被等待之后再次使用，
/// 因此 GPU 不会读到被本帧覆盖的数据。
pub struct GraphicsResourcesPool<T: Clone> {
    frames: Vec<Vec<T>>,
    cursor: usize,
}

impl<T: Clone> Default for GraphicsResourcesPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

// new & init
impl<T: Clone> GraphicsResourcesPool<T> {
    pub fn new() -> Self {
        Self {
            frames: Vec::new(),
            cursor: 0,
        }
    }
}

// getters
impl<T: Clone> GraphicsResourcesPool<T> {
    /// 某个 frame index 已经创建的资源数量
    #[inline]
    pub fn capacity(&self, frame_index: usize) -> usize {
        self.frames.get(frame_index).map_or(0, Vec::len)
    }

    #[inline]
    pub fn cursor(&self) -> usize {
        self.cursor
    }
}

// tools
impl<T: Clone> GraphicsResourcesPool<T> {
    /// 取出 frame_index 的下一个资源，不够时用 create 创建
    pub fn get(&mut self, frame_index: usize, create: impl FnOnce() -> GraphicsResult<T>) -> GraphicsResult<T> {
        if self.frames.len() <= frame_index {
            self.frames.resize_with(frame_index + 1, Vec::new);
        }
        let frame = &mut self.frames[frame_index];

        // 游标属于上一帧，说明切换 frame index 时没有 reset
        if self.cursor > frame.len() {
            return Err(GraphicsError::InvalidOperation(format!(
                "resources pool cursor {} is beyond frame {} (size {}), missing reset()",
                self.cursor,
                frame_index,
                frame.len()
            )));
        }
        if self.cursor == frame.len() {
            frame.push(create()?);
            log::debug!("resources pool grows to {} for frame {}", frame.len(), frame_index);
        }
        let item = frame[self.cursor].clone();
        self.cursor += 1;
        Ok(item)
    }

    /// 使用 context 当前的 frame index
    pub fn get_current(
        &mut self,
        ctx: &dyn GraphicsContext,
        create: impl FnOnce(&dyn GraphicsContext) -> GraphicsResult<T>,
    ) -> GraphicsResult<T> {
        self.get(ctx.current_frame_index(), || create(ctx))
    }

    /// 每帧开始时调用
    #[inline]
    pub fn reset(&mut self) {
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;

    fn counting_get(pool: &mut GraphicsResourcesPool<Rc<u32>>, frame: usize, created: &Cell<u32>) -> Rc<u32> {
        pool.get(frame, || {
            created.set(created.get() + 1);
            Ok(Rc::new(created.get()))
        })
        .unwrap()
    }

    #[test]
    fn test_distinct_within_frame() {
        let created = Cell::new(0);
        let mut pool = GraphicsResourcesPool::new();
        let items: Vec<_> = (0..3).map(|_| counting_get(&mut pool, 0, &created)).collect();

        assert_eq!(created.get(), 3);
        assert!(!Rc::ptr_eq(&items[0], &items[1]));
        assert!(!Rc::ptr_eq(&items[1], &items[2]));
        assert_eq!(pool.capacity(0), 3);
    }

    #[test]
    fn test_reuse_and_grow_by_one() {
        let created = Cell::new(0);
        let mut pool = GraphicsResourcesPool::new();
        let first: Vec<_> = (0..3).map(|_| counting_get(&mut pool, 0, &created)).collect();

        // 同一槽位的下一轮，请求数不超过上次
        pool.reset();
        let second: Vec<_> = (0..2).map(|_| counting_get(&mut pool, 0, &created)).collect();
        assert_eq!(created.get(), 3);
        assert!(Rc::ptr_eq(&first[0], &second[0]));
        assert!(Rc::ptr_eq(&first[1], &second[1]));

        pool.reset();
        (0..4).for_each(|_| {
            counting_get(&mut pool, 0, &created);
        });
        assert_eq!(created.get(), 4);
        assert_eq!(pool.capacity(0), 4);
    }

    #[test]
    fn test_frames_are_independent() {
        let created = Cell::new(0);
        let mut pool = GraphicsResourcesPool::new();
        let a = counting_get(&mut pool, 0, &created);
        pool.reset();
        let b = counting_get(&mut pool, 1, &created);

        assert!(!Rc::ptr_eq(&a, &b));
        assert_eq!(pool.capacity(0), 1);
        assert_eq!(pool.capacity(1), 1);
        assert_eq!(pool.capacity(5), 0);
    }

    #[test]
    fn test_failed_create_does_not_advance() {
        let mut pool = GraphicsResourcesPool::<u32>::new();
        let err = pool.get(0, || Err(GraphicsError::Unsupported("out of memory".to_string())));
        assert!(err.is_err());
        assert_eq!(pool.cursor(), 0);
        assert_eq!(pool.get(0, || Ok(5)).unwrap(), 5);
    }
}
