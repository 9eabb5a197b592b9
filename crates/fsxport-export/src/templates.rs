//! Template preamble of the scene file
//!
//! The texts are emitted verbatim; which blocks appear depends on the target
//! SDK.

use std::io::Write;

use fsxport_core::{Result, SdkVersion};

use crate::writer::XWriter;

/// Write every template block the SDK understands
pub fn write_templates<W: Write>(out: &mut XWriter<W>, sdk: SdkVersion) -> Result<()> {
    out.write(BASE)?;
    if sdk.supports_second_uv() {
        out.write(MESH_TEXTURE_COORDS2)?;
    }
    out.write(MESH_SKIN_WEIGHTS)?;
    out.write(if sdk.uses_fs10_material() {
        MESH_MATERIAL_LIST_FS10
    } else {
        MESH_MATERIAL_LIST_OPEN
    })?;
    out.write(FRAMES_AND_TEXTURES)?;
    out.write(if sdk.uses_fs10_material() { FS10_MATERIAL } else { P3D_MATERIAL })?;
    out.write(MATERIAL_EXTENSIONS)?;
    if sdk.supports_pbr() {
        out.write(PBR_MATERIAL)?;
    }
    if sdk.supports_clear_coat() {
        out.write(CLEAR_COAT)?;
    }
    out.write(PART_DATA_AND_HEADER)
}

/// Core templates every SDK understands
pub const BASE: &str = r#"template Header {
 <3D82AB43-62DA-11cf-AB39-0020AF71E433>
 WORD major;
 WORD minor;
 DWORD flags;
}

template GuidToName {
 <7419dfe5-b73a-4d66-98d8-c082591dc9e7>
 STRING Guid;
 STRING Name;
}

template Vector {
 <3D82AB5E-62DA-11cf-AB39-0020AF71E433>
 FLOAT x;
 FLOAT y;
 FLOAT z;
}

template ShadowMapReady {
 <2F4F86A9-FE94-4f75-AA1B-299BBD98907B>
 Boolean SMReady;
}

template OverrideBoundingBox {
 <03390521-5EF8-49F0-B6D3-6E91B2068A91>
 Boolean OverrideBoundingBox;
 Vector BoundingBoxMin;
 Vector BoundingBoxMax;
}

template OverrideRadius {
 <6400393B-6210-4917-99C8-968D4DEE0F3A>
 Boolean OverrideRadius;
 FLOAT Radius;
}

template SkinWeight {
 <C3B5EDF9-7345-463d-96D7-6386E2EC4030>
 STRING boneRef;
 FLOAT weight;
}

template SkinWeightGroup {
 <E7B502DB-0C05-4288-A025-80762E19E0AB>
 DWORD nWeights;
 array SkinWeight skinWeights[nWeights];
}

template Coords2d {
 <F6F23F44-7686-11cf-8F52-0040333594A3>
 FLOAT u;
 FLOAT v;
}

template Matrix4x4 {
 <F6F23F45-7686-11cf-8F52-0040333594A3>
 array FLOAT matrix[16];
}

template ColorRGBA {
 <35FF44E0-6C7C-11cf-8F52-0040333594A3>
 FLOAT red;
 FLOAT green;
 FLOAT blue;
 FLOAT alpha;
}

template ColorRGB {
 <D3E16E81-7835-11cf-8F52-0040333594A3>
 FLOAT red;
 FLOAT green;
 FLOAT blue;
}

template TextureFilename {
 <A42790E1-7810-11cf-8F52-0040333594A3>
 STRING filename;
}

template Material {
 <3D82AB4D-62DA-11cf-AB39-0020AF71E433>
 ColorRGBA faceColor;
 FLOAT power;
 ColorRGB specularColor;
 ColorRGB emissiveColor;
 [...]
}

template MeshFace {
 <3D82AB5F-62DA-11cf-AB39-0020AF71E433>
 DWORD nFaceVertexIndices;
 array DWORD faceVertexIndices[nFaceVertexIndices];
}

template MeshTextureCoords {
 <F6F23F40-7686-11cf-8F52-0040333594A3>
 DWORD nTextureCoords;
 array Coords2d textureCoords[nTextureCoords];
}

"#;

/// Second UV channel, p3dv4 and later
pub const MESH_TEXTURE_COORDS2: &str = r#"
template MeshTextureCoords2 {
 <564556B9-6802-49AB-8910-31D759C378CF>
 DWORD nTextureCoords;
 array Coords2d textureCoords[nTextureCoords];
}
"#;

pub const MESH_SKIN_WEIGHTS: &str = r#"
template MeshSkinWeights {
 <C7E2131A-30F3-4eb9-AACC-E0AE11D8FE62>
 DWORD nVertices;
 array SkinWeightGroup skinWeights[nVertices];
}

"#;

/// Material list restricted to `Material` children
pub const MESH_MATERIAL_LIST_FS10: &str = r#"
template MeshMaterialList {
 <F6F23F42-7686-11cf-8F52-0040333594A3>
 DWORD nMaterials;
 DWORD nFaceIndexes;
 array DWORD faceIndexes[nFaceIndexes];
 [Material]
}

"#;

/// Material list open to any child, so `PBRMaterial` fits
pub const MESH_MATERIAL_LIST_OPEN: &str = r#"
template MeshMaterialList {
 <F6F23F42-7686-11cf-8F52-0040333594A3>
 DWORD nMaterials;
 DWORD nFaceIndexes;
 array DWORD faceIndexes[nFaceIndexes];
 [...]
}

"#;

/// Mesh, frame, animation and texture file templates
pub const FRAMES_AND_TEXTURES: &str = r#"
template MeshNormals {
 <F6F23F43-7686-11cf-8F52-0040333594A3>
 DWORD nNormals;
 array Vector normals[nNormals];
 DWORD nFaceNormals;
 array MeshFace faceNormals[nFaceNormals];
}

template Mesh {
 <3D82AB44-62DA-11cf-AB39-0020AF71E433>
 DWORD nVertices;
 array Vector vertices[nVertices];
 DWORD nFaces;
 array MeshFace faces[nFaces];
 [...]
}

template BoneInfo {
 <1FF0AE59-4B0B-4dfe-88F2-91D58E395767>
 STRING boneName;
}

template AnimLinkName {
 <0057EC91-F96B-4f5e-9CFB-0E305F39DA1A>
 STRING linkName;
}

template IKChain {
 <2684B333-AAB2-45d9-87D8-6E2BB22616AD>
 STRING chainName;
 STRING startNode;
 STRING endNode;
}

template ConstraintInfo {
 <8713D495-C538-44dc-AE54-1097E7C93D13>
 Boolean bActive;
 Boolean bLimited;
 FLOAT fUpperLimit;
 FLOAT fLowerLimit;
}

// Note that the exported rotation order is YZX
template JointConstraint {
 <BE433CF1-BCC0-43f8-9FE5-DB0556414426>
 array ConstraintInfo Rotation[3];
 array ConstraintInfo Translation[3];
}

template FrameTransformMatrix {
 <F6F23F41-7686-11cf-8F52-0040333594A3>
 Matrix4x4 frameMatrix;
}

template Frame {
 <3D82AB46-62DA-11cf-AB39-0020AF71E433>
 [...]
}
template FloatKeys {
 <10DD46A9-775B-11cf-8F52-0040333594A3>
 DWORD nValues;
 array FLOAT values[nValues];
}

template TimedFloatKeys {
 <F406B180-7B3B-11cf-8F52-0040333594A3>
 DWORD time;
 FloatKeys tfkeys;
}

template AnimationKey {
 <10DD46A8-775B-11cf-8F52-0040333594A3>
 DWORD keyType;
 DWORD nKeys;
 array TimedFloatKeys keys[nKeys];
}

template AnimationOptions {
 <E2BF56C0-840F-11cf-8F52-0040333594A3>
 DWORD openclosed;
 DWORD positionquality;
}

template Animation {
 <3D82AB4F-62DA-11cf-AB39-0020AF71E433>
 [...]
}

template AnimationSet {
 <3D82AB50-62DA-11cf-AB39-0020AF71E433>
 [Animation]
}

template DiffuseTextureFileName {
 <E00200E2-D4AB-481a-9B85-E20F9AE07401>
 STRING filename;
}

template DiffuseTextureUVChannel {
 <E0A8A960-BA3F-4E17-805C-D0B94831BAA4>
 DWORD uvChannel;
}

template SpecularTextureFileName {
 <DF64E0D7-4FFA-4634-9DA0-3EF2FAA081CE>
 STRING filename;
}

template SpecularTextureUVChannel {
 <0E95C17B-0AEF-4D07-BA90-E4B2CD5E01AE>
 DWORD uvChannel;
}

template AmbientTextureFileName {
 <E00200E2-D4AB-481a-9B85-E20F9AE07402>
 STRING filename;
}

template AmbientTextureUVChannel {
 <FAADED67-439E-446F-B96B-5381A0DC731F>
 DWORD uvChannel;
}

template EmissiveTextureFileName {
 <E00200E2-D4AB-481a-9B85-E20F9AE07403>
 STRING filename;
}

template EmissiveTextureUVChannel {
 <F8EF95D3-0307-41C7-9A42-CBE434A97BFA>
 DWORD uvChannel;
}

template ReflectionTextureFileName {
 <E00200E2-D4AB-481a-9B85-E20F9AE07404>
 STRING filename;
}

template ShininessTextureFileName {
 <E00200E2-D4AB-481a-9B85-E20F9AE07405>
 STRING filename;
}

template ShininessTextureUVChannel {
 <98C9B8F8-4A0F-48C7-9886-38299FB8210B>
 DWORD uvChannel;
}

template BumpTextureFileName {
 <E00200E2-D4AB-481a-9B85-E20F9AE07406>
 STRING filename;
}

template BumpTextureUVChannel {
 <12B12581-A164-4D63-AB12-41B2F43F7793>
 DWORD uvChannel;
}

template DisplacementTextureFileName {
 <E00200E2-D4AB-481a-9B85-E20F9AE07407>
 STRING filename;
}

template DisplacementTextureUVChannel {
 <BB58EEEF-9200-42FA-BF5F-4297948CD2BA>
 DWORD uvChannel;
}

template DetailTextureFileName {
 <C223DC28-5C0E-41bc-9706-A30E023EF118>
 STRING filename;
}

template DetailTextureUVChannel {
 <6BCF39C7-4E24-4977-803A-521BABF54D34>
 DWORD uvChannel;
}

template FresnelTextureFileName {
 <C16742E5-974D-4576-870D-2047C79DF7A9>
 STRING filename;
}
"#;

pub const FS10_MATERIAL: &str = r#"
template FS10Material {
 <16B4B490-C327-42e3-8A71-0FA35C817EA2>
 ColorRGBA FallbackDiffuse;
 ColorRGB  Specular;
 FLOAT     Power;
 FLOAT     DetailScale;
 FLOAT     BumpScale;
 FLOAT     EnvironmentLevelScale;
 Boolean   bUseGlobalEnv;
 Boolean   bModEnvInvDiffuseAlpha;
 Boolean   bModEnvSpecularMapAlpha;
 Boolean   bFresnelDiffuse; Boolean bFresnelSpecular; Boolean bFresnelEnvironment;
 Boolean   bUsePrecipitation;
 Boolean   bPrecipOffset;
 FLOAT     PrecipOffset;
 FLOAT     SpecMapPowerScale;
 STRING    SrcBlend;
 STRING    DstBlend;
 [...]
}
"#;

pub const P3D_MATERIAL: &str = r#"
template P3DMaterial {
 <16B4B490-C327-42e3-8A71-0FA35C817EA2>
 ColorRGBA FallbackDiffuse;
 ColorRGB  Specular;
 FLOAT     Power;
 FLOAT     DetailScale;
 FLOAT     BumpScale;
 FLOAT     EnvironmentLevelScale;
 Boolean   bUseGlobalEnv;
 Boolean   bModEnvInvDiffuseAlpha;
 Boolean   bModEnvSpecularMapAlpha;
 Boolean   bFresnelDiffuse; Boolean bFresnelSpecular; Boolean bFresnelEnvironment;
 Boolean   bUsePrecipitation;
 Boolean   bPrecipOffset;
 FLOAT     PrecipOffset;
 FLOAT     SpecMapPowerScale;
 STRING    SrcBlend;
 STRING    DstBlend;
 [...]
}
"#;

/// Optional records nested in the specular material
pub const MATERIAL_EXTENSIONS: &str = r#"
template AllowBloom {
 <D66E37C9-9DFE-4092-8565-C6E4C3498235>
 Boolean     AllowBloom;
}

template BloomData {
 <58ED1E67-0D18-44EF-B676-40BB20C1EE88>
 Boolean BloomCopy;
 Boolean BloomModAlpha;
}

template SpecularBloomFloor {
 <21195174-A31D-47ed-BE5A-04ACAD4C3544>
 FLOAT     SpecularBloomFloor;
}

template AmbientLightScale {
 <4CC76AEB-E84F-4688-AB49-E1DC4B9273C7>
 FLOAT     AmbientLightScale;
}

template EmissiveData {
 <A02EF480-3ED3-433d-A71D-5CAC4775757A>
 STRING   EmissiveBlend;
}

template AlphaData {
 <10DB69F3-E0EE-4fb3-8055-63E539EF5885>
 Boolean  ZTestAlpha;
 FLOAT    AlphaTestValue;
 STRING   AlphaTestFunction;
 Boolean  FinalAlphaWrite;
 FLOAT    FinalAlphaWriteValue;
}

template MaskDiffuseBlendsByDetailBlendMask {
 <442265E0-6F93-43C8-8310-C3E1E6848833>
 Boolean  MaskDiffuseBlendsByDetailBlendMask;
}

template MaskFinalAlphaBlendByDetailBlendMask {
 <73671D1D-535E-4DC6-A543-5B226273C5DA>
 Boolean  MaskFinalAlphaBlendByDetailBlendMask;
}

template EnhancedParameters {
 <99CAD20D-DCC5-4ad4-ADAE-ED3CDE30CC02>
 Boolean  AssumeVerticalNormal;
 Boolean  ZWriteAlpha;
 Boolean  NoZWrite;
 Boolean  VolumeShadow;
 Boolean  NoShadow;
 Boolean  PrelitVertices;
}

template BaseMaterialSpecular {
 <E294ED4E-5C5A-4927-B19A-6A2D445FAF24>
 Boolean  AllowBaseMaterialSpecular;
}

template BaseMaterialSkin {
 <B640F860-9E28-4cab-AD46-CACCE2A418AC>
 Boolean  AllowSkinning;
}

template DoubleSidedMaterial {
 <B1C6C3B0-DD1A-417b-919A-B04BAD6AE06D>
 Boolean  DoubleSided;
}

template BlendConstantSetting {
 <48EA96C3-588E-451d-B4BB-0C746C8380D9>
 Boolean  BlendConstant;
}

template ForceTextureAddressWrapSetting {
 <046EE84C-7977-4a11-AA2B-C79FF5391EDD>
 Boolean  ForceTextureAddressWrap;
}

template ForceTextureAddressClampSetting {
 <DB108D57-A3A8-4b76-8CB0-8379CDDEC074>
 Boolean  ForceTextureAddressClamp;
}

template ZBiasValue {
<66F4E05E-94B9-4F07-AE1B-1FFE66810F4E>
FLOAT  ZBias;
}

template NoSpecularBloom {
 <BCE314D2-15DB-4ffd-9F6F-0763B2A4616F>
 Boolean AllowSpecularBloom;
}

template EmissiveBloom {
 <5FF8D7A2-30B5-41bc-A891-28A427D78246>
 Boolean  AllowEmissiveBloom;
}

template BlendDiffuseByBaseAlpha {
 <A623FA7C-37CB-4d17-B702-854E0DBDB467>
 Boolean  BlendDiffByBaseAlpha;
}

template BlendDiffuseByInverseSpecularMapAlpha {
 <DAA68529-1C27-4182-9D97-E631A4759EA7>
 Boolean  BlendDiffuseByInvSpecAlpha;
}

template NNumberTexture {
 <E49E744A-CDBE-40c1-9C89-4A46BEB44D33>
 Boolean  IsNNumberTexture;
}

template MaterialScript {
 <2EE1D70C-4903-4205-AB03-B4A21BF7F323>
 STRING  MaterialScriptFilename;
}

template UseEmissiveAlphaAsHeatMap {
 <F5A3E710-014D-450F-8597-78D00D4AC048>
 Boolean  UseEmissiveAlphaHeatMap;
}

template TemperatureScale {
 <8215033A-0F10-45F0-8493-5C60DC4DD5B5>
 FLOAT  TemperatureScalar;
}

template DetailColor {
 <68E59B99-A9A1-4E27-8660-6B83520657BB>
 ColorRGBA  DetailColor;
}

template DetailTextureParameters {
 <B1D63F06-FCFB-4DCA-B51A-8889A594EBAE>
 FLOAT    DetailOffsetU;
 FLOAT    DetailOffsetV;
 FLOAT    DetailRotation;
 FLOAT    DetailScaleV;
 STRING   DetailBlendMode;
 FLOAT    DetailBlendWeight;
 Boolean  UseDetailAlphaAsBlendMask;
}"#;

/// PBR material and its texture records, p3dv2 and later
pub const PBR_MATERIAL: &str = r#"

template PBRMaterial {
 <91A9F118-F571-4440-B40C-E822088EEBB7>
 ColorRGBA Albedo;
 FLOAT     Metallic;
 FLOAT     Smoothness;
 STRING    RenderMode;
 FLOAT     MaskedThreshold;
 Boolean   AlphaToCoverage;
 Boolean   MetallicHasOcclusion;
 STRING    SmoothnessSource;
 STRING    EmissiveMode;
 Boolean   AssumeVerticalNormal;
 Boolean   Prelit;
 Boolean   DoubleSided;
 DWORD     DecalOrder;
 [...]
}

template AlbedoTextureFileName {
 <23F8BD09-7405-4492-88C9-0428E31DF902>
 STRING filename;
}

template AlbedoTextureUVChannel {
 <61C9E02F-9AB2-4A3E-8849-7FE0A9B56B89>
 DWORD uvChannel;
}

template MetallicTextureFileName {
 <287C8494-CBF8-4050-B2F4-2030D27246FD>
 STRING filename;
}

template MetallicTextureUVChannel {
 <FAF56F68-4C7C-475D-807C-4C1244AF83D7>
 DWORD uvChannel;
}

template NormalTextureFileName {
 <09176F1D-E9F6-4674-8BD2-D89C02CBE19E>
 STRING filename;
}

template NormalTextureUVChannel {
 <C1680BD6-CC82-4390-844A-95B2B80ADE4B>
 DWORD uvChannel;
}

template NormalTextureScale {
 <AAD9D138-F62B-49AF-B09A-DD628D0E2250>
 FLOAT u;
 FLOAT v;
}

template DetailTextureScale {
 <4762DCAD-6B53-4BDA-8464-E85E19B4D8F4>
 FLOAT u;
 FLOAT v;
}
"#;

/// Clear coat and metallic reflectance records, p3dv5 and later
pub const CLEAR_COAT: &str = r#"
template MetallicHasReflectance {
<E426288E-6CB9-48A4-9D83-004B3EEA9BE3>
Boolean MetallicHasReflectance;
}
template ClearCoatTextureFileName {
 <5C66613E-CA51-4667-BCB9-42C393205DDC>
 STRING filename;
}

template ClearCoatTextureUVChannel {
 <7FA3BB7D-87D1-4CA7-B8F7-C091AEFE95F1>
 DWORD uvChannel;
}

template ClearCoatContainsNormals {
 <68A8C88B-8FF2-43A0-83DA-17F34D4B3CE1>
 Boolean ContainsNormals;
}
"#;

/// Attach point payload template and the file `Header` record
pub const PART_DATA_AND_HEADER: &str = r#"
template PartData {
 <79B183BA-7E70-44d1-914A-23B304CA91E5>
 DWORD nByteCount;
 array BYTE XMLData[ nByteCount ];
}

Header {
    1;
    0;
    1;
}
"#;
