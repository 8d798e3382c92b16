use criterion::{criterion_group, criterion_main, Criterion};
use fieldpack::{
    Ascii, Bcd, BcdInt, BcdLength, BcdPadding, FieldKind, FixedBitmap, HexLength, HexTag, Packer,
    Schema, SchemaBuilder,
};
use std::sync::Arc;

/// An authorization-style schema: fixed MTI, bitmapped data elements, and a
/// TLV tail of ICC sub-fields.
fn schema() -> Schema {
    let schema = SchemaBuilder::root(FieldKind::Message)
        .name("auth")
        .child(FieldKind::FixedValue)
        .name("mti")
        .fixed_len(2)
        .body(Arc::new(Bcd::new(BcdPadding::None)))
        .up()
        .unwrap()
        .child(FieldKind::BitmapContainer)
        .name("elements")
        .bitmap(Arc::new(FixedBitmap::new(1)))
        .children_len_codec(Arc::new(BcdLength::new(1)))
        .child(FieldKind::LengthValue)
        .name("pan")
        .body(Arc::new(Bcd::new(BcdPadding::LeftZero)))
        .sibling_like("pan")
        .unwrap()
        .name("amount")
        .up()
        .unwrap()
        .up()
        .unwrap()
        .child(FieldKind::FixedValue)
        .name("stan")
        .fixed_len(3)
        .body(Arc::new(BcdInt::new(3)))
        .up()
        .unwrap()
        .child(FieldKind::TagLengthValue)
        .name("icc")
        .tag(0x55)
        .tag_codec(Arc::new(HexTag))
        .tag_width(1)
        .len_codec(Arc::new(HexLength))
        .children_tag_codec(Arc::new(HexTag))
        .children_len_codec(Arc::new(HexLength))
        .children_tag_width(1)
        .child(FieldKind::TagLengthValue)
        .name("cryptogram")
        .tag(0x26)
        .body(Arc::new(Ascii))
        .up()
        .unwrap()
        .child(FieldKind::TagLengthValue)
        .name("atc")
        .tag(0x36)
        .body(Arc::new(Ascii))
        .build();
    schema.validate().unwrap();
    schema
}

fn populate(message: &mut Packer<'_>) {
    message.at("mti").unwrap().set_text("0100");
    message.at("elements.pan").unwrap().set_text("4111111111111111");
    message.at("elements.amount").unwrap().set_text("123456");
    message.at("stan").unwrap().set_int(123456);
    message.at("icc.cryptogram").unwrap().set_text("9F26AB01");
    message.at("icc.atc").unwrap().set_text("0001");
}

fn bench_pack(c: &mut Criterion) {
    let schema = schema();
    c.bench_function("pack_auth", |b| {
        b.iter(|| {
            let mut message = Packer::new(&schema);
            populate(&mut message);
            message.pack().unwrap()
        });
    });
}

fn bench_unpack(c: &mut Criterion) {
    let schema = schema();
    let mut message = Packer::new(&schema);
    populate(&mut message);
    let wire = message.pack().unwrap();
    c.bench_function("unpack_auth", |b| {
        b.iter(|| Packer::unpack(&schema, &wire[..]).unwrap());
    });
}

criterion_group!(benches, bench_pack, bench_unpack);
criterion_main!(benches);
