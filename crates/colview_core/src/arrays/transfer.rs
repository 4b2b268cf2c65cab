use colview_error::Result;

use crate::buffer::buffer_manager::BufferManager;

/// Vectors whose buffers can be handed over to another vector, possibly
/// owned by a different buffer manager.
pub trait Transferable: Sized {
    type Manager: BufferManager;
    /// Reservations covering every buffer of a vector.
    type Reservations;

    fn manager(&self) -> &Self::Manager;

    /// Create an empty vector with the same field, owned by `manager`.
    fn empty_like(&self, manager: &Self::Manager) -> Self;

    /// Check that `target` can receive this vector's buffers.
    fn check_transfer_target(&self, target: &Self) -> Result<()>;

    /// Reserve room in `manager` for all of this vector's buffers.
    ///
    /// Nothing is moved.
    fn reserve_transfer(&self, manager: &Self::Manager) -> Result<Self::Reservations>;

    /// Move all buffers into `target` using reservations made by
    /// `reserve_transfer` against the target's manager, leaving this vector
    /// empty.
    ///
    /// The reservations previously backing the buffers are released.
    fn complete_transfer(&mut self, target: &mut Self, reservations: Self::Reservations);

    /// Move all buffers into `target` without copying, leaving this vector
    /// empty.
    ///
    /// Either every buffer moves or nothing does.
    fn transfer_into(&mut self, target: &mut Self) -> Result<()> {
        self.check_transfer_target(target)?;
        let reservations = self.reserve_transfer(target.manager())?;
        self.complete_transfer(target, reservations);
        Ok(())
    }

    /// Copy rows `start..start+len` into `target`, replacing its contents.
    fn split_into(&self, start: usize, len: usize, target: &mut Self) -> Result<()>;
}

/// A source vector paired with the vector that will receive its buffers.
#[derive(Debug)]
pub struct TransferPair<'a, V: Transferable> {
    source: &'a mut V,
    target: V,
}

impl<'a, V> TransferPair<'a, V>
where
    V: Transferable,
{
    /// Pair `source` with a new empty vector owned by `manager`.
    pub fn new(source: &'a mut V, manager: &V::Manager) -> Self {
        let target = source.empty_like(manager);
        TransferPair { source, target }
    }

    /// Pair `source` with an existing target vector.
    pub fn try_with_target(source: &'a mut V, target: V) -> Result<Self> {
        source.check_transfer_target(&target)?;
        Ok(TransferPair { source, target })
    }

    pub fn transfer(&mut self) -> Result<()> {
        self.source.transfer_into(&mut self.target)
    }

    pub fn split_and_transfer(&mut self, start: usize, len: usize) -> Result<()> {
        self.source.split_into(start, len, &mut self.target)
    }

    pub fn source(&self) -> &V {
        self.source
    }

    pub fn target(&self) -> &V {
        &self.target
    }

    pub fn target_mut(&mut self) -> &mut V {
        &mut self.target
    }

    pub fn into_target(self) -> V {
        self.target
    }
}
