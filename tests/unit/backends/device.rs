use super::*;

#[test]
fn allocations_are_tracked_and_released_on_drop() {
    let device = DeviceContext::new("gpu0");
    let a = device.upload(&[1, 2, 3]).unwrap();
    let b = device.alloc_zeroed(5).unwrap();

    let stats = device.stats();
    assert_eq!(stats.live_allocations, 2);
    assert_eq!(stats.live_bytes, 8);
    assert_eq!(stats.total_allocations, 2);
    assert_eq!(stats.uploads, 1);

    drop(a);
    drop(b);
    let stats = device.stats();
    assert_eq!(stats.live_allocations, 0);
    assert_eq!(stats.live_bytes, 0);
    assert_eq!(stats.total_allocations, 2);
}

#[test]
fn writes_resize_and_reads_count_downloads() {
    let device = DeviceContext::new("gpu0");
    let mut buffer = device.alloc_zeroed(2).unwrap();
    buffer.write(&[9, 8, 7, 6]).unwrap();
    assert_eq!(buffer.len(), 4);
    assert_eq!(device.stats().live_bytes, 4);
    assert_eq!(buffer.read().unwrap(), vec![9, 8, 7, 6]);
    assert_eq!(device.stats().downloads, 1);
}

#[test]
fn device_copies_skip_the_host() {
    let device = DeviceContext::new("gpu0");
    let source = device.upload(&[4, 4]).unwrap();
    let mut target = device.alloc_zeroed(0).unwrap();
    target.copy_from(&source).unwrap();

    let stats = device.stats();
    assert_eq!(stats.device_copies, 1);
    assert_eq!(stats.uploads, 1);
    assert_eq!(stats.downloads, 0);
    assert_eq!(target.read().unwrap(), vec![4, 4]);
}

#[test]
fn lost_device_refuses_work_but_still_frees() {
    let device = DeviceContext::new("gpu0");
    let mut buffer = device.upload(&[1]).unwrap();
    let copy = buffer.duplicate();
    device.lose();

    assert!(!device.is_alive());
    assert!(!buffer.is_available());
    assert!(!copy.is_available());
    assert!(matches!(
        buffer.read(),
        Err(ReprError::ResourceUnavailable(_))
    ));
    assert!(buffer.write(&[2]).is_err());
    let err = device.alloc_zeroed(1).unwrap_err();
    assert!(err.to_string().contains("device 'gpu0' is lost"));

    drop(buffer);
    drop(copy);
    assert_eq!(device.stats().live_allocations, 0);
}

#[test]
fn clones_share_one_device() {
    let device = DeviceContext::new("gpu0");
    let alias = device.clone();
    assert!(device.same_device(&alias));
    assert!(!device.same_device(&DeviceContext::new("gpu0")));

    alias.lose();
    assert!(!device.is_alive());
    assert_eq!(format!("{device:?}"), "DeviceContext { name: \"gpu0\", alive: false }");
}
