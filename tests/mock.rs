use std::cell::{RefCell, RefMut};
use std::rc::Rc;

use mockall::*;

#[automock]
pub trait Spy {
	fn trigger(&self, value: u64);
}

#[derive(Clone)]
pub struct SharedMock(Rc<RefCell<MockSpy>>);

impl SharedMock {
	pub fn new() -> SharedMock {
		SharedMock(Rc::new(RefCell::new(MockSpy::new())))
	}

	pub fn get(&self) -> RefMut<'_, MockSpy> {
		self.0.borrow_mut()
	}
}
