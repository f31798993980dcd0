//! Hex encodings of the built-in group parameters.
//!
//! Each constant is split into 64-digit rows and concatenated at load time.

// 4096-bit P = Q * R + 1 with Q = 2^256 - 189.

/// Large prime P
pub(super) const STANDARD_P: &[&str] = &[
    "8000000000000000000000000000000000000000000000000000000000000000",
    "0000000000000000000000000000000000000000000000000000000000000000",
    "0000000000000000000000000000000000000000000000000000000000000000",
    "0000000000000000000000000000000000000000000000000000000000000000",
    "0000000000000000000000000000000000000000000000000000000000000000",
    "0000000000000000000000000000000000000000000000000000000000000000",
    "0000000000000000000000000000000000000000000000000000000000000000",
    "0000000000000000000000000000000000000000000000000000000000000000",
    "0000000000000000000000000000000000000000000000000000000000000000",
    "0000000000000000000000000000000000000000000000000000000000000000",
    "0000000000000000000000000000000000000000000000000000000000000000",
    "0000000000000000000000000000000000000000000000000000000000000000",
    "0000000000000000000000000000000000000000000000000000000000000000",
    "0000000000000000000000000000000000000000000000000000000000000000",
    "0000000000000000000000000000000000000000000000000000000000000303",
    "7FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF00BAF1858D873C8EDA814CA7901CCB",
];

/// Subgroup order Q
pub(super) const STANDARD_Q: &[&str] = &[
    "FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF43",
];

/// Cofactor R = (P - 1) / Q
pub(super) const STANDARD_R: &[&str] = &[
    "800000000000000000000000000000000000000000000000000000000000005E",
    "80000000000000000000000000000000000000000000000000000000000045C4",
    "8000000000000000000000000000000000000000000000000000000000338212",
    "80000000000000000000000000000000000000000000000000000000260707A8",
    "8000000000000000000000000000000000000000000000000000001C1330A766",
    "800000000000000000000000000000000000000000000000000014BA2AEB96AC",
    "800000000000000000000000000000000000000000000000000F4D71AFEE3D5A",
    "8000000000000000000000000000000000000000000000000B4C2CEEE2E34BD0",
    "800000000000000000000000000000000000000000000008573D2C5D81CEF8EE",
    "8000000000000000000000000000000000000000000006286829C108D5CDC814",
    "800000000000000000000000000000000000000000048BD4E6D38385D8ECB722",
    "8000000000000000000000000000000000000000035B3C2E6A2819D126C33478",
    "80000000000000000000000000000000000000027A5B6E445F9B0F699E1DBCF6",
    "80000000000000000000000000000000000001D45580687A957A60F9BBF481FC",
    "80000000000000000000000000000000000159C31FCD22805B59985FC383FA6E",
];

/// Generator of the order-Q subgroup
pub(super) const STANDARD_G: &[&str] = &[
    "48597A98ADE5BB6D7D9A7F111736D79B983C4C79ACF5E78144DF5ADC9E6432F5",
    "D18367B03C84C1233D08767F55CEA6A22BB9FC63F6BD1938EF0491A2C23A6754",
    "902E32BF87886C4A32501BD76BD58010F584834095F3F8F5FF6B445D1BDBB318",
    "E91F5213FE1736038D14875EC978A3E3628AAE6B774640C4A2D7BAF25D45F08B",
    "92503B9038CD27D6A12BC5C5067B8B6936BB3E6394DBE4D07AF2D72EC74B0272",
    "F027A806E501B3DB0E6EE4B7063E10D85F4D00BDF2E04418E93A7F77DBE4CEC3",
    "9311400520D6153D5BD5309522B2D9B2916EB1482E7BC59FF81F7D6B1C035D52",
    "C35A4D602B139D3C6F239D48FD211B2F8BEB4E7E972AA25DC6FA2119A18CE16B",
    "67166F3902A8B7B538240B5B3EC28BCCA84EF85021863CEA84C34709CD83161A",
    "A8B3D15120DC21C50C8114B26F820E42B29FD6CC439005E96A90A33E4019B97D",
    "43F211D402BAE5F7132AE0126432D1F6E60E462EBF298E3FA062F517CB0A5D96",
    "FC2442BD57EFEA260829EE8A37B5B11057C1EBC2D709D9DA5A2BEF1AAD736501",
    "05FEF7EA1A6F6E78605A62B2DC910C2E6F21A5B24514B4E00E3864B8A4BB26FE",
    "CEABE0DC07AB8E2290F125CDEB17FD2DE0809205CAA633BD1E074CEA5D2C7800",
    "B03E2A2E4DCE82E651639A4C151691583124549880486380043CB3006BC6990D",
    "01322E9D9A0CEBB721C1C6BA22A2E9D7F2231B9C1ECDF4BE323B391A4F4FFEF0",
];

// 512-bit P with the 64-bit Q = 2^64 - 59. Fast enough for tests and simulations.

/// Large prime P
pub(super) const REDUCED_P: &[&str] = &[
    "8000000000000000000000000000000000000000000000000000000000000000",
    "0000000000000000000000000000000000000000000002567FFFBD3AAFF5C821",
];

/// Subgroup order Q
pub(super) const REDUCED_Q: &[&str] = &[
    "FFFFFFFFFFFFFFC5",
];

/// Cofactor R = (P - 1) / Q
pub(super) const REDUCED_R: &[&str] = &[
    "800000000000001D80000000000006CC800000000001912180000000005C72B8",
    "80000000154E708580000004E913EEC480000121B79809A0",
];

/// Generator of the order-Q subgroup
pub(super) const REDUCED_G: &[&str] = &[
    "45D307FCA2E6ECA98B06AA18AE42F9BA87C5D02C951143617D35B3B14B1A1E01",
    "79A4BC3E9104F3641D0E29FC766462725CCC7721AF2D6F4304163CAB4B221239",
];
