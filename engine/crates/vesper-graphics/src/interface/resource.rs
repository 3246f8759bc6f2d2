use std::any::Any;

use crate::basic::graphics_type::GraphicsBackend;

/// 所有图形资源共同的基础接口
///
/// `backend()` 用于在 debug 下检查资源是否属于当前后端，
/// `as_any()` 用于后端把抽象资源还原为自己的具体类型
pub trait GraphicsResource: Any {
    fn backend(&self) -> GraphicsBackend;

    fn as_any(&self) -> &dyn Any;
}

/// 把抽象资源向下转换为后端的具体类型
///
/// 传入其它后端的资源是调用方的编程错误：debug 下先检查 backend 标记，之后转换失败直接 panic
pub fn downcast_resource<T: 'static, R: GraphicsResource + ?Sized>(resource: &R, backend: GraphicsBackend) -> &T {
    debug_assert_eq!(
        resource.backend(),
        backend,
        "resource of backend {:?} passed to backend {:?}",
        resource.backend(),
        backend
    );
    match resource.as_any().downcast_ref::<T>() {
        Some(concrete) => concrete,
        None => panic!("resource is not a {}", std::any::type_name::<T>()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Thing: GraphicsResource {}

    struct NullThing(u32);
    impl GraphicsResource for NullThing {
        fn backend(&self) -> GraphicsBackend {
            GraphicsBackend::Null
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }
    impl Thing for NullThing {}

    struct OtherThing;
    impl GraphicsResource for OtherThing {
        fn backend(&self) -> GraphicsBackend {
            GraphicsBackend::Null
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }
    impl Thing for OtherThing {}

    #[test]
    fn test_downcast_concrete() {
        let thing: Box<dyn Thing> = Box::new(NullThing(7));
        let concrete: &NullThing = downcast_resource(thing.as_ref(), GraphicsBackend::Null);
        assert_eq!(concrete.0, 7);
    }

    #[test]
    #[should_panic]
    fn test_downcast_wrong_type_panics() {
        let thing: Box<dyn Thing> = Box::new(OtherThing);
        let _: &NullThing = downcast_resource(thing.as_ref(), GraphicsBackend::Null);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic]
    fn test_downcast_wrong_backend_panics() {
        let thing: Box<dyn Thing> = Box::new(NullThing(1));
        let _: &NullThing = downcast_resource(thing.as_ref(), GraphicsBackend::Vulkan);
    }
}
