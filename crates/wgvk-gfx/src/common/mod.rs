pub mod ref_counted;
pub mod weak_ptr;
