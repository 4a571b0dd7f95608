/// `Port` models a latched IO interface between two pipeline stages.
use std::marker::PhantomData;
use std::sync::{Arc, OnceLock, RwLock};

#[derive(Default)]
pub struct InputPort {}

#[derive(Default)]
pub struct OutputPort {}

#[derive(Default)]
pub struct Channel<T: Clone> {
    valid: bool,
    data: T,
}

/// Wrapper type of a reference to a channel.  Newtype is necessary to implement get/put methods at
/// the reference type.
pub struct ChannelRef<T: Clone>(Arc<RwLock<Channel<T>>>);

#[derive(Default)]
pub struct Port<D, T: Clone> {
    // RwLock is necessary because each component has no knowledge of when the other component will
    // do concurrent access to the port.
    lock: OnceLock<ChannelRef<T>>,
    direction: PhantomData<D>,
}

impl<D, T: Default + Clone> Port<D, T> {
    pub fn new() -> Self {
        Port {
            lock: OnceLock::new(),
            direction: PhantomData,
        }
    }

    pub fn valid(&self) -> bool {
        self.lock.get().expect("port lock not set").valid()
    }
}

impl<OutputPort, T: Default + Clone> Port<OutputPort, T> {
    pub fn blocked(&self) -> bool {
        self.valid()
    }

    /// Access method of an output port from *within* the module that has the port.
    pub fn put(&mut self, data: &T) -> bool {
        self.lock.get().expect("port lock not set").put(data)
    }

    /// Latch a value onto the channel unconditionally, overwriting whatever the consumer has not
    /// yet sampled.  This is the behavior of a clocked register output, as opposed to the
    /// ready/valid handshake of `put`.
    pub fn post(&mut self, data: &T) {
        self.lock.get().expect("port lock not set").post(data)
    }
}

impl<InputPort, T: Default + Clone> Port<InputPort, T> {
    pub fn peek(&self) -> Option<T> {
        self.lock.get().expect("lock not set").peek()
    }

    /// Access method of an input port from *within* the module that has the port.
    pub fn get(&mut self) -> Option<T> {
        self.lock.get().expect("lock not set").get()
    }
}

impl<T: Clone> ChannelRef<T> {
    pub fn valid(&self) -> bool {
        self.0.read().expect("rw lock poisoned").valid
    }

    pub fn blocked(&self) -> bool {
        self.valid()
    }

    pub fn peek(&self) -> Option<T> {
        let channel = self.0.read().expect("rw lock poisoned");
        channel.valid.then_some(channel.data.clone())
    }

    /// Put a value onto the channel.
    /// Returns true if the channel was ready and the data was successfully put.
    pub fn put(&self, data: &T) -> bool {
        if self.blocked() {
            return false;
        }
        let mut channel = self.0.write().expect("rw lock poisoned");
        channel.valid = true;
        channel.data = data.clone();
        true
    }

    /// Latch a value onto the channel regardless of whether it already holds one.
    pub fn post(&self, data: &T) {
        let mut channel = self.0.write().expect("rw lock poisoned");
        channel.valid = true;
        channel.data = data.clone();
    }

    /// Get a value from the channel, invalidating it.
    /// Returns Some if the channel had a valid data, or None otherwise.
    pub fn get(&self) -> Option<T> {
        let mut channel = self.0.write().expect("rw lock poisoned");
        match channel.valid {
            false => None,
            true => {
                channel.valid = false;
                Some(channel.data.clone())
            }
        }
    }
}

/// transfers data from an output port to an input port of the same type,
/// by giving them the same valid and data pointer
pub fn link<T: Default + Clone>(
    a: &mut Port<InputPort, T>,
    b: &mut Port<OutputPort, T>,
) -> ChannelRef<T> {
    let lock = Arc::new(RwLock::new(Channel::<T> {
        valid: false,
        data: T::default(),
    }));
    a.lock
        .set(ChannelRef(Arc::clone(&lock)))
        .map_err(|_| "")
        .expect("lock already set");
    b.lock
        .set(ChannelRef(Arc::clone(&lock)))
        .map_err(|_| "")
        .expect("lock already set");
    ChannelRef(lock)
}

/// Tie an output port off without connecting to another input port.
pub fn tie_off<T: Default + Clone>(a: &mut Port<OutputPort, T>) -> ChannelRef<T> {
    let lock = Arc::new(RwLock::new(Channel::<T> {
        valid: false,
        data: T::default(),
    }));
    a.lock
        .set(ChannelRef(Arc::clone(&lock)))
        .map_err(|_| "")
        .expect("lock already set");
    ChannelRef(lock)
}
