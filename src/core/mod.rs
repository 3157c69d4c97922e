pub mod shm;

pub use shm::ShmQueue;
