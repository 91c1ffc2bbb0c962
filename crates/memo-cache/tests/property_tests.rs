//! Property tests for the transform pipeline round-trip law.

use memo_cache::{
    Codec, CompressionType, Compressor, JsonStage, Payload, Stage, TransformPipeline,
};
use proptest::prelude::*;
use serde_json::{Value, json};
use std::sync::Arc;

fn json_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        any::<f64>()
            .prop_filter("json numbers are finite", |f| f.is_finite())
            .prop_map(Value::from),
        ".{0,24}".prop_map(Value::from),
    ];
    leaf.prop_recursive(3, 32, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::from),
            prop::collection::hash_map("[a-z]{1,6}", inner, 0..6)
                .prop_map(|m| json!(m)),
        ]
    })
}

fn raw_bytes() -> impl Strategy<Value = Payload> {
    prop::collection::vec(any::<u8>(), 0..512).prop_map(Payload::Bytes)
}

fn payload() -> impl Strategy<Value = Payload> {
    prop_oneof![json_value().prop_map(Payload::Value), raw_bytes()]
}

fn xor_stage(key: u8) -> Stage {
    let flip = move |payload: Payload| -> memo_cache::StageResult {
        match payload {
            Payload::Bytes(bytes) => {
                Ok(Payload::Bytes(bytes.iter().map(|b| b ^ key).collect()))
            }
            value => Ok(value),
        }
    };
    Stage::from_fns("xor", flip, flip)
}

/// Every pipeline shape under test. The json stage only inverts structured
/// values, so it is left out when `with_json` is false.
fn pipelines(with_json: bool) -> Vec<TransformPipeline> {
    let codecs: Vec<Arc<dyn Compressor>> = [
        CompressionType::Lz4,
        CompressionType::Zstd,
        CompressionType::Gzip,
    ]
    .into_iter()
    .filter(CompressionType::is_compiled_in)
    .map(|algorithm| Arc::new(Codec::new(algorithm)) as Arc<dyn Compressor>)
    .collect();

    let mut pipelines = vec![
        TransformPipeline::identity(),
        TransformPipeline::new(vec![xor_stage(0x5a)], None).unwrap(),
    ];
    for codec in codecs {
        pipelines.push(TransformPipeline::new(vec![], Some(codec.clone())).unwrap());
        pipelines.push(
            TransformPipeline::new(vec![xor_stage(0x3c)], Some(codec.clone())).unwrap(),
        );
        if with_json {
            pipelines.push(
                TransformPipeline::new(vec![Stage::sync(JsonStage), xor_stage(0xa5)], Some(codec))
                    .unwrap(),
            );
        }
    }
    if with_json {
        pipelines.push(TransformPipeline::new(vec![Stage::sync(JsonStage)], None).unwrap());
    }
    pipelines
}

proptest! {
    #[test]
    fn decode_inverts_encode_for_values(value in json_value()) {
        let value = Payload::Value(value);
        for pipeline in pipelines(true) {
            let encoded = tokio_test::block_on(pipeline.encode(value.clone())).unwrap();
            let decoded = tokio_test::block_on(pipeline.decode(encoded)).unwrap();
            prop_assert_eq!(&decoded, &value, "pipeline {:?}", pipeline);
        }
    }

    #[test]
    fn decode_inverts_encode_for_bytes(value in raw_bytes()) {
        for pipeline in pipelines(false) {
            let encoded = tokio_test::block_on(pipeline.encode(value.clone())).unwrap();
            let decoded = tokio_test::block_on(pipeline.decode(encoded)).unwrap();
            prop_assert_eq!(&decoded, &value, "pipeline {:?}", pipeline);
        }
    }

    #[test]
    fn compressed_output_is_always_bytes(value in payload()) {
        let pipeline = TransformPipeline::new(
            vec![],
            Some(Arc::new(Codec::new(CompressionType::Lz4))),
        )
        .unwrap();
        let encoded = tokio_test::block_on(pipeline.encode(value)).unwrap();
        prop_assert!(encoded.is_bytes());
    }
}
