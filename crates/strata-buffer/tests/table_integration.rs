//! Integration tests: buffer tables end to end.
//!
//! Exercises the public API the way a simulation host would: register a
//! schema, fill buffers, mirror the schema into a second table, push the
//! pointer table to a device, and keep ref lists in the table's heap.

use proptest::prelude::*;
use strata_buffer::{BufferError, BufferTable, TableConfig};
use strata_core::{BufferId, DeviceError, ElementKind, SlotIndex, UsageFlags};
use strata_heap::RefList;
use strata_test_utils::{init_tracing, MockDevice};

const POS: BufferId = BufferId(0);
const VEL: BufferId = BufferId(1);
const NBR: BufferId = BufferId(7);

fn u32s(bytes: &[u8]) -> Vec<u32> {
    bytes
        .chunks_exact(4)
        .map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

#[test]
fn append_then_delete_keeps_order() {
    init_tracing();
    let mut table = BufferTable::new(TableConfig::default()).unwrap();
    table.register(POS, "pos", 4, 0, UsageFlags::CPU).unwrap();
    for v in [100u32, 200, 300] {
        let i = table.append(POS).unwrap();
        table
            .element_mut(POS, i)
            .unwrap()
            .copy_from_slice(&v.to_ne_bytes());
    }
    table.delete_element(POS, 1).unwrap();

    assert_eq!(table.len(POS), Some(2));
    assert_eq!(u32s(table.bytes(POS).unwrap()), vec![100, 300]);
    assert!(table.capacity(POS).unwrap() >= 2);
}

#[test]
fn schema_mirror_then_bulk_copy() {
    init_tracing();
    let mut src = BufferTable::new(TableConfig::default()).unwrap();
    src.register(POS, "pos", 12, 4, UsageFlags::CPU).unwrap();
    src.register(VEL, "vel", 12, 4, UsageFlags::CPU).unwrap();
    src.register(NBR, "nbr", 4, 1, UsageFlags::CPU).unwrap();
    src.set_kind(POS, ElementKind::Float3).unwrap();
    src.unregister(VEL).unwrap();

    let coords: Vec<u8> = [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0]
        .iter()
        .flat_map(|f| f.to_ne_bytes())
        .collect();
    src.raw_copy_in(POS, &coords, 2).unwrap();
    src.append_n(NBR, 1).unwrap().copy_from_slice(&9u32.to_ne_bytes());

    let mut dst = BufferTable::new(TableConfig::default()).unwrap();
    dst.match_schema(&src, None).unwrap();
    assert_eq!(dst.slot_count(), src.slot_count());
    for (slot, name, buffer) in src.iter() {
        let mirrored = dst.slot(slot).unwrap();
        assert_eq!(dst.name(slot), Some(name));
        assert_eq!(mirrored.user_id(), buffer.user_id());
        assert_eq!(mirrored.stride(), buffer.stride());
        assert!(mirrored.is_empty());
    }

    src.copy_all(&mut dst, UsageFlags::CPU).unwrap();
    assert_eq!(dst.bytes(POS), src.bytes(POS));
    assert_eq!(dst.bytes(NBR), src.bytes(NBR));
    assert_eq!(
        dst.format_element(POS, 1).unwrap(),
        "4.000000,5.000000,6.000000"
    );
}

#[test]
fn unmatched_tables_refuse_bulk_copy() {
    let mut a = BufferTable::new(TableConfig::default()).unwrap();
    let mut b = BufferTable::new(TableConfig::default()).unwrap();
    a.register(POS, "pos", 4, 1, UsageFlags::CPU).unwrap();
    b.register(VEL, "vel", 4, 1, UsageFlags::CPU).unwrap();
    let err = a.copy_all(&mut b, UsageFlags::CPU).unwrap_err();
    assert!(err.is_fatal());
}

#[test]
fn device_round_trip_and_pointer_table() {
    init_tracing();
    let device = MockDevice::new();
    device.define_symbol("bufs", TableConfig::default().pointer_table_bytes());
    let mut table =
        BufferTable::with_device(TableConfig::default(), Box::new(device.clone())).unwrap();
    table
        .register(POS, "pos", 4, 2, UsageFlags::CPU | UsageFlags::DEVICE)
        .unwrap();
    table.register(VEL, "vel", 4, 2, UsageFlags::CPU).unwrap();
    table.append_n(POS, 2).unwrap().fill(0xAB);

    table.commit_all().unwrap();
    table.push_to_device("bufs").unwrap();

    let ptr = table.device_ptr(POS).unwrap();
    assert_eq!(device.read(ptr).unwrap(), vec![0xAB; 8]);
    let words: Vec<u64> = device
        .read_symbol("bufs")
        .unwrap()
        .chunks_exact(8)
        .map(|c| u64::from_ne_bytes(c.try_into().unwrap()))
        .collect();
    assert_eq!(words.len(), 128);
    assert_eq!(words[POS.index()], ptr.0);
    assert_eq!(words[VEL.index()], 0);
    assert!(words[2..].iter().all(|&w| w == 0));
}

#[test]
fn mismatched_device_symbol_is_fatal() {
    let device = MockDevice::new();
    device.define_symbol("bufs", 64 * 8);
    let mut table =
        BufferTable::with_device(TableConfig::default(), Box::new(device.clone())).unwrap();
    let err = table.push_to_device("bufs").unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(
        err,
        BufferError::Device(DeviceError::SymbolSizeMismatch {
            expected: 1024,
            actual: 512,
            ..
        })
    ));
}

#[test]
fn ref_lists_live_in_the_table_heap() {
    let mut table = BufferTable::new(TableConfig::default()).unwrap();
    let mut lists = [RefList::new(); 3];
    for round in 0..20u32 {
        for (i, list) in lists.iter_mut().enumerate() {
            table
                .heap_mut()
                .append_ref(list, round, i as u32 * 1000)
                .unwrap();
        }
    }
    for (i, list) in lists.iter().enumerate() {
        let expected: Vec<u32> = (0..20).map(|r| r + i as u32 * 1000).collect();
        assert_eq!(table.heap().refs(list), expected.as_slice());
    }
    table.heap().check_free_list().unwrap();

    let mut copy = BufferTable::new(TableConfig::default()).unwrap();
    copy.copy_heap_from(&table);
    assert_eq!(copy.heap().refs(&lists[1]), table.heap().refs(&lists[1]));
}

#[test]
fn tombstoned_slots_stay_addressable() {
    let mut table = BufferTable::new(TableConfig::default()).unwrap();
    let slots: Vec<SlotIndex> = (0..5u16)
        .map(|i| {
            table
                .register(BufferId(i), &format!("b{i}"), 4, 1, UsageFlags::CPU)
                .unwrap()
        })
        .collect();
    table.unregister(BufferId(2)).unwrap();
    table.register(BufferId(2), "b2", 8, 1, UsageFlags::CPU).unwrap();

    assert_eq!(table.slot_count(), 6);
    for (i, &slot) in slots.iter().enumerate() {
        assert_eq!(table.slot(slot).unwrap().user_id(), BufferId(i as u16));
    }
    assert_eq!(table.lookup(BufferId(2)), Some(SlotIndex(5)));
    assert_eq!(table.buffer(BufferId(2)).unwrap().stride(), 8);
}

proptest! {
    #[test]
    fn count_never_exceeds_capacity(ops in proptest::collection::vec(0u8..4, 1..200)) {
        let mut table = BufferTable::new(TableConfig::new(4)).unwrap();
        table.register(POS, "pos", 4, 0, UsageFlags::CPU).unwrap();
        let mut model: Vec<u32> = Vec::new();
        for (step, op) in ops.into_iter().enumerate() {
            match op {
                0 | 1 => {
                    let i = table.append(POS).unwrap();
                    let v = step as u32;
                    table.element_mut(POS, i).unwrap().copy_from_slice(&v.to_ne_bytes());
                    model.push(v);
                }
                2 if !model.is_empty() => {
                    let idx = step % model.len();
                    table.delete_element(POS, idx).unwrap();
                    model.remove(idx);
                }
                _ => {
                    let bump = table.capacity(POS).unwrap() + 3;
                    table.resize(POS, bump, true).unwrap();
                }
            }
            let buffer = table.buffer(POS).unwrap();
            prop_assert!(buffer.len() <= buffer.capacity());
            prop_assert_eq!(buffer.size(), buffer.capacity() * buffer.stride());
        }
        prop_assert_eq!(u32s(table.bytes(POS).unwrap()), model);
    }
}
