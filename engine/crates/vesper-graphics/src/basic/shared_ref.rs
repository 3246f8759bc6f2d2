use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

/// 按指针身份比较的共享引用
///
/// pipeline 的描述里保存着 shader、layout 等共享资源，
/// 判断描述是否变化时只关心是不是同一个对象，而不是对象内容。
pub struct SharedRef<T: ?Sized>(pub Rc<T>);

impl<T: ?Sized> SharedRef<T> {
    #[inline]
    pub fn new(rc: Rc<T>) -> Self {
        Self(rc)
    }

    #[inline]
    pub fn rc(&self) -> &Rc<T> {
        &self.0
    }
}

impl<T: ?Sized> Clone for SharedRef<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: ?Sized> PartialEq for SharedRef<T> {
    fn eq(&self, other: &Self) -> bool {
        // 只比较数据地址，忽略 vtable
        std::ptr::addr_eq(Rc::as_ptr(&self.0), Rc::as_ptr(&other.0))
    }
}

impl<T: ?Sized> Eq for SharedRef<T> {}

impl<T: ?Sized> Deref for SharedRef<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: ?Sized> From<Rc<T>> for SharedRef<T> {
    fn from(rc: Rc<T>) -> Self {
        Self(rc)
    }
}

impl<T: ?Sized> fmt::Debug for SharedRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SharedRef({:p})", Rc::as_ptr(&self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Named {
        fn name(&self) -> &str;
    }
    struct A(String);
    impl Named for A {
        fn name(&self) -> &str {
            &self.0
        }
    }

    #[test]
    fn test_identity_not_content() {
        let a: Rc<dyn Named> = Rc::new(A("same".to_string()));
        let b: Rc<dyn Named> = Rc::new(A("same".to_string()));

        assert_eq!(SharedRef::new(a.clone()), SharedRef::new(a.clone()));
        assert_ne!(SharedRef::new(a.clone()), SharedRef::new(b));
        assert_eq!(SharedRef::new(a).name(), "same");
    }
}
