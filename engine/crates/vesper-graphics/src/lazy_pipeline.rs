//! pipeline 的延迟重建
//!
//! setter 只修改描述并设置 dirty 标记，native pipeline 在下一次被使用时统一重建一次。

use crate::basic::error::GraphicsResult;

/// 持有 pipeline 描述 `D` 与对应的 native 对象 `N`
pub struct LazyPipeline<D, N> {
    desc: D,
    native: Option<N>,

    need_recreate: bool,
    /// pipeline layout 需要和 pipeline 一起重建
    layout_dirty: bool,

    rebuild_count: u32,
}

// new & init
impl<D, N> LazyPipeline<D, N> {
    pub fn new(desc: D) -> Self {
        Self {
            desc,
            native: None,
            need_recreate: true,
            layout_dirty: true,
            rebuild_count: 0,
        }
    }
}

// getters
impl<D, N> LazyPipeline<D, N> {
    #[inline]
    pub fn desc(&self) -> &D {
        &self.desc
    }

    /// 已经构建好的 native 对象，可能已经过期
    #[inline]
    pub fn native(&self) -> Option<&N> {
        self.native.as_ref()
    }

    #[inline]
    pub fn need_recreate(&self) -> bool {
        self.need_recreate
    }

    #[inline]
    pub fn layout_dirty(&self) -> bool {
        self.layout_dirty
    }

    /// native 对象被构建的次数
    #[inline]
    pub fn rebuild_count(&self) -> u32 {
        self.rebuild_count
    }
}

// setters
impl<D, N> LazyPipeline<D, N> {
    /// 比较后设置描述中的某个字段
    ///
    /// 值未变化时什么也不做并返回 false；否则写入新值、标记需要重建并返回 true
    pub fn update<T: PartialEq>(&mut self, field: impl FnOnce(&mut D) -> &mut T, value: T) -> bool {
        let slot = field(&mut self.desc);
        if *slot == value {
            return false;
        }
        *slot = value;
        self.need_recreate = true;
        true
    }

    /// 修改 pipeline layout 相关的部分（shader resources layout、push constant）
    ///
    /// 总是会使 layout 失效
    pub fn update_layout(&mut self, edit: impl FnOnce(&mut D)) {
        edit(&mut self.desc);
        self.need_recreate = true;
        self.layout_dirty = true;
    }
}

// tools
impl<D, N> LazyPipeline<D, N> {
    /// 返回最新的 native 对象，必要时先重建
    ///
    /// `build` 的参数依次为：当前描述、旧的 native 对象（可以从中复用 layout）、layout 是否需要重建。
    /// 旧对象在新对象构建成功之后被 drop，由它自己的 Drop 进入延迟删除队列。
    /// 构建失败时保留旧对象，下一次调用会再次尝试。
    pub fn get_or_rebuild(&mut self, build: impl FnOnce(&D, Option<&N>, bool) -> GraphicsResult<N>) -> GraphicsResult<&N> {
        if self.need_recreate || self.native.is_none() {
            let layout_dirty = self.layout_dirty || self.native.is_none();
            let new_native = build(&self.desc, self.native.as_ref(), layout_dirty)?;

            self.native = None;
            self.need_recreate = false;
            self.layout_dirty = false;
            self.rebuild_count += 1;
            return Ok(self.native.insert(new_native));
        }

        match &self.native {
            Some(native) => Ok(native),
            None => unreachable!("native pipeline checked above"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic::error::GraphicsError;

    #[derive(Debug, Clone, PartialEq, Default)]
    struct Desc {
        cull: u32,
        depth_test: bool,
        layouts: Vec<u32>,
    }

    #[derive(Debug)]
    struct Native {
        generation: u32,
        layout_generation: u32,
    }

    fn build(lazy: &mut LazyPipeline<Desc, Native>) -> (u32, u32) {
        let native = lazy
            .get_or_rebuild(|_, old, layout_dirty| {
                let generation = old.map_or(0, |o| o.generation + 1);
                let layout_generation = match old {
                    Some(old) if !layout_dirty => old.layout_generation,
                    Some(old) => old.layout_generation + 1,
                    None => 0,
                };
                Ok(Native {
                    generation,
                    layout_generation,
                })
            })
            .unwrap();
        (native.generation, native.layout_generation)
    }

    #[test]
    fn test_unchanged_setter_is_noop() {
        let mut lazy = LazyPipeline::<Desc, Native>::new(Desc::default());
        build(&mut lazy);
        assert_eq!(lazy.rebuild_count(), 1);

        assert!(!lazy.update(|d| &mut d.cull, 0));
        assert!(!lazy.update(|d| &mut d.depth_test, false));
        assert!(!lazy.need_recreate());

        build(&mut lazy);
        assert_eq!(lazy.rebuild_count(), 1);
    }

    #[test]
    fn test_many_setters_one_rebuild() {
        let mut lazy = LazyPipeline::<Desc, Native>::new(Desc::default());
        build(&mut lazy);

        assert!(lazy.update(|d| &mut d.cull, 2));
        assert!(lazy.update(|d| &mut d.depth_test, true));
        assert!(lazy.update(|d| &mut d.cull, 1));
        assert!(lazy.need_recreate());

        assert_eq!(build(&mut lazy), (1, 0));
        assert_eq!(build(&mut lazy), (1, 0));
        assert_eq!(lazy.rebuild_count(), 2);
        assert_eq!(lazy.desc().cull, 1);
    }

    #[test]
    fn test_layout_change_rebuilds_layout() {
        let mut lazy = LazyPipeline::<Desc, Native>::new(Desc::default());
        assert_eq!(build(&mut lazy), (0, 0));

        lazy.update(|d| &mut d.cull, 3);
        assert_eq!(build(&mut lazy), (1, 0));

        lazy.update_layout(|d| d.layouts.push(7));
        assert!(lazy.layout_dirty());
        assert_eq!(build(&mut lazy), (2, 1));
        assert!(!lazy.layout_dirty());
    }

    #[test]
    fn test_failed_build_keeps_old() {
        let mut lazy = LazyPipeline::<Desc, Native>::new(Desc::default());
        build(&mut lazy);
        lazy.update(|d| &mut d.cull, 9);

        let err = lazy.get_or_rebuild(|_, _, _| Err(GraphicsError::InvalidArgument("no shader".to_string())));
        assert!(err.is_err());
        assert!(lazy.need_recreate());
        assert_eq!(lazy.native().map(|n| n.generation), Some(0));

        assert_eq!(build(&mut lazy), (1, 0));
    }
}
