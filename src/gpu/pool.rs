use super::handle::Handle;

/// Slot storage for backend-side resources addressed by [`Handle`].
///
/// Freed slots are reused, so a stale handle may alias a newer resource the
/// same way a deleted name can in an immediate-mode API.
pub struct ResourcePool<K, T> {
    items: Vec<Option<T>>,
    free: Vec<usize>,
    _marker: std::marker::PhantomData<fn() -> K>,
}

impl<K, T> ResourcePool<K, T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            free: Vec::new(),
            _marker: std::marker::PhantomData,
        }
    }

    pub fn insert(&mut self, item: T) -> Handle<K> {
        if let Some(index) = self.free.pop() {
            self.items[index] = Some(item);
            return Handle::new(index);
        }
        let index = self.items.len();
        self.items.push(Some(item));
        Handle::new(index)
    }

    pub fn get(&self, handle: Handle<K>) -> Option<&T> {
        self.items.get(handle.index()).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, handle: Handle<K>) -> Option<&mut T> {
        self.items.get_mut(handle.index()).and_then(Option::as_mut)
    }

    pub fn remove(&mut self, handle: Handle<K>) -> Option<T> {
        let removed = self.items.get_mut(handle.index())?.take();
        if removed.is_some() {
            self.free.push(handle.index());
        }
        removed
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.items.iter_mut().flatten()
    }

    pub fn len(&self) -> usize {
        self.items.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, T> Default for ResourcePool<K, T> {
    fn default() -> Self {
        Self::new()
    }
}
