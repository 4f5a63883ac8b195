use std::sync::Arc;
use crate::graphics_device::mock_graphics_device::{MockEvent, MockGraphicsDevice};
use crate::graphics_device::{DeviceLimits, GraphicsDevice};
use super::*;

fn allocator(device: &MockGraphicsDevice, class: UsageClass, nominal: u64) -> TransientBufferAllocator {
    let device: Arc<dyn GraphicsDevice> = Arc::new(device.clone());
    TransientBufferAllocator::new(device, class, nominal, "test").unwrap()
}

// ============================================================================
// Allocation
// ============================================================================

#[test]
fn test_reset_is_idempotent() {
    let device = MockGraphicsDevice::new();
    let mut alloc = allocator(&device, UsageClass::Uniform, 1024);

    let first = alloc.allocate(100).unwrap();
    alloc.reset();
    let second = alloc.allocate(100).unwrap();

    assert_eq!(first.offset(), 0);
    assert_eq!(second.offset(), 0);
    assert_eq!(first.buffer().raw_handle(), second.buffer().raw_handle());
    assert_eq!(alloc.backing_count(), 1);
}

#[test]
fn test_sequential_offsets_differ_by_alignment() {
    let device = MockGraphicsDevice::new();
    let mut alloc = allocator(&device, UsageClass::Uniform, 4096);
    let align = device.limits().min_uniform_buffer_offset_alignment;

    let a = alloc.allocate(1).unwrap();
    let b = alloc.allocate(1).unwrap();

    assert_eq!(b.offset() - a.offset(), align);
    assert_eq!(alloc.alignment(), align);
}

#[test]
fn test_offsets_respect_class_alignment() {
    let limits = DeviceLimits {
        min_vertex_buffer_offset_alignment: 16,
        min_storage_buffer_offset_alignment: 64,
        ..DeviceLimits::default()
    };
    let device = MockGraphicsDevice::with_limits(limits);
    let mut vertices = allocator(&device, UsageClass::Vertex, 4096);
    let mut storage = allocator(&device, UsageClass::Storage, 4096);

    for size in [3, 17, 40, 1] {
        assert_eq!(vertices.allocate(size).unwrap().offset() % 16, 0);
        assert_eq!(storage.allocate(size).unwrap().offset() % 64, 0);
    }
}

#[test]
fn test_overflow_creates_second_backing_buffer() {
    let device = MockGraphicsDevice::new();
    let mut alloc = allocator(&device, UsageClass::Vertex, 1024);

    let a = alloc.allocate(600).unwrap();
    let b = alloc.allocate(600).unwrap();

    assert_eq!(alloc.backing_count(), 2);
    assert_ne!(a.buffer().raw_handle(), b.buffer().raw_handle());
    assert_eq!(b.offset(), 0);
    assert_eq!(alloc.capacity_bytes(), 2048);
}

#[test]
fn test_earlier_buffer_reused_when_it_has_room() {
    let device = MockGraphicsDevice::new();
    let mut alloc = allocator(&device, UsageClass::Vertex, 1024);

    let first = alloc.allocate(600).unwrap();
    alloc.allocate(600).unwrap();
    let small = alloc.allocate(100).unwrap();

    assert_eq!(small.buffer().raw_handle(), first.buffer().raw_handle());
    assert_eq!(small.offset(), 608);
}

#[test]
fn test_oversized_request_gets_own_buffer() {
    let device = MockGraphicsDevice::new();
    let mut alloc = allocator(&device, UsageClass::Vertex, 256);

    let big = alloc.allocate(1000).unwrap();

    assert_eq!(big.offset(), 0);
    assert!(big.buffer().size() >= 1000);
    assert_eq!(alloc.backing_count(), 1);
}

#[test]
fn test_backing_buffers_survive_reset() {
    let device = MockGraphicsDevice::new();
    let mut alloc = allocator(&device, UsageClass::Vertex, 1024);
    alloc.allocate(1000).unwrap();
    alloc.allocate(1000).unwrap();

    alloc.reset();

    assert_eq!(alloc.backing_count(), 2);
    assert_eq!(alloc.used_bytes(), 0);
}

#[test]
fn test_out_of_memory_propagates() {
    let device = MockGraphicsDevice::new();
    let mut alloc = allocator(&device, UsageClass::Vertex, 1024);
    device.set_buffer_budget(Some(1));

    alloc.allocate(1000).unwrap();
    let result = alloc.allocate(1000);

    assert!(matches!(result, Err(Error::OutOfMemory)));
    assert_eq!(alloc.backing_count(), 1);
}

// ============================================================================
// Uniform groups and writes
// ============================================================================

#[test]
fn test_uniform_backing_gets_dynamic_group_and_tail_room() {
    let device = MockGraphicsDevice::new();
    let mut alloc = allocator(&device, UsageClass::Uniform, 1024);

    let a = alloc.allocate(64).unwrap();

    assert!(a.binding_group().is_some());
    assert_eq!(a.buffer().size(), 1024 + DYNAMIC_UNIFORM_RANGE);
    assert!(device.events().iter().any(|e| matches!(
        e,
        MockEvent::CreateBindingGroup { range, .. } if *range == DYNAMIC_UNIFORM_RANGE
    )));

    let mut vertices = allocator(&device, UsageClass::Vertex, 1024);
    assert!(vertices.allocate(64).unwrap().binding_group().is_none());
}

#[test]
fn test_write_lands_at_allocation_offset() {
    let device = MockGraphicsDevice::new();
    let mut alloc = allocator(&device, UsageClass::Uniform, 1024);
    alloc.allocate(4).unwrap();
    let b = alloc.allocate(4).unwrap();

    b.write(&[1, 2, 3, 4]).unwrap();

    let bytes = device.buffer_contents(b.buffer().raw_handle());
    assert_eq!(&bytes[256..260], &[1, 2, 3, 4]);
    assert_eq!(b.dynamic_offset().unwrap(), 256);
}

#[test]
fn test_write_past_allocation_rejected() {
    let device = MockGraphicsDevice::new();
    let mut alloc = allocator(&device, UsageClass::Uniform, 1024);
    let a = alloc.allocate(4).unwrap();

    assert!(matches!(a.write(&[0; 5]), Err(Error::InvalidResource(_))));
    assert!(matches!(a.write_at(2, &[0; 3]), Err(Error::InvalidResource(_))));
}

#[test]
fn test_write_at_huge_offset_rejected() {
    let device = MockGraphicsDevice::new();
    let mut alloc = allocator(&device, UsageClass::Vertex, 1024);
    let a = alloc.allocate(16).unwrap();

    assert!(matches!(a.write_at(u64::MAX, &[0; 4]), Err(Error::InvalidResource(_))));
    assert!(matches!(a.write_at(u64::MAX - 1, &[0; 2]), Err(Error::InvalidResource(_))));
    assert!(device.events().iter().all(|e| !matches!(e, MockEvent::WriteBuffer { .. })));
}

// ============================================================================
// Flush
// ============================================================================

#[test]
fn test_flush_covers_used_rounded_to_atom() {
    let limits = DeviceLimits {
        min_vertex_buffer_offset_alignment: 16,
        non_coherent_atom_size: 64,
        ..DeviceLimits::default()
    };
    let device = MockGraphicsDevice::with_limits(limits);
    let mut alloc = allocator(&device, UsageClass::Vertex, 1024);
    let a = alloc.allocate(100).unwrap();
    device.clear_events();

    alloc.flush().unwrap();

    assert_eq!(
        device.events(),
        vec![MockEvent::FlushBuffer { buffer: a.buffer().raw_handle(), offset: 0, size: 128 }]
    );
}

#[test]
fn test_flush_skips_unused_buffers() {
    let device = MockGraphicsDevice::new();
    let mut alloc = allocator(&device, UsageClass::Vertex, 1024);
    alloc.allocate(10).unwrap();
    alloc.reset();
    device.clear_events();

    alloc.flush().unwrap();

    assert!(device.events().is_empty());
}

#[test]
fn test_flush_clamped_to_buffer_size() {
    let limits = DeviceLimits {
        min_vertex_buffer_offset_alignment: 4,
        non_coherent_atom_size: 256,
        ..DeviceLimits::default()
    };
    let device = MockGraphicsDevice::with_limits(limits);
    let mut alloc = allocator(&device, UsageClass::Vertex, 100);
    alloc.allocate(100).unwrap();
    device.clear_events();

    alloc.flush().unwrap();

    assert!(matches!(device.events().as_slice(), [MockEvent::FlushBuffer { size: 100, .. }]));
}

#[test]
fn test_coherent_memory_not_flushed() {
    let device = MockGraphicsDevice::new();
    device.state().coherent = true;
    let mut alloc = allocator(&device, UsageClass::Vertex, 1024);
    alloc.allocate(10).unwrap();
    device.clear_events();

    alloc.flush().unwrap();

    assert!(device.events().is_empty());
}

#[test]
fn test_zero_nominal_size_rejected() {
    let device: Arc<dyn GraphicsDevice> = Arc::new(MockGraphicsDevice::new());
    let result = TransientBufferAllocator::new(device, UsageClass::Vertex, 0, "bad");
    assert!(matches!(result, Err(Error::InitializationFailed(_))));
}
